use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockval_accounting::TaxType;
use stockval_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use stockval_events::Event;

use crate::config::Company;
use crate::stock_move::{MoveId, MoveState, StockMove};
use crate::valuation::ShipmentAmounts;

/// Shipment identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentId(pub AggregateId);

impl ShipmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentKind {
    /// Goods received from a supplier.
    #[default]
    Incoming,
    /// Goods sent back to a supplier.
    IncomingReturn,
    /// Goods delivered to a customer.
    Outgoing,
    /// Goods returned by a customer.
    OutgoingReturn,
}

impl ShipmentKind {
    /// Role of the moves that carry the shipment's value; `None` means all.
    pub fn valued_role(self) -> Option<MoveRole> {
        match self {
            ShipmentKind::Incoming | ShipmentKind::OutgoingReturn => Some(MoveRole::Incoming),
            ShipmentKind::Outgoing => Some(MoveRole::Outgoing),
            ShipmentKind::IncomingReturn => None,
        }
    }

    pub fn tax_type(self) -> TaxType {
        match self {
            ShipmentKind::Incoming | ShipmentKind::Outgoing => TaxType::Invoice,
            ShipmentKind::IncomingReturn | ShipmentKind::OutgoingReturn => TaxType::CreditNote,
        }
    }
}

/// Position of a move inside its shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveRole {
    /// Between the partner and the warehouse input/output.
    Incoming,
    Outgoing,
    /// Internal moves between warehouse locations.
    Inventory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentMove {
    pub role: MoveRole,
    #[serde(rename = "move")]
    pub stock_move: StockMove,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentState {
    #[default]
    Draft,
    Done,
    Cancelled,
}

/// States in which totals are served from the amounts cache.
pub const CACHED_STATES: [ShipmentState; 2] = [ShipmentState::Done, ShipmentState::Cancelled];

impl ShipmentState {
    pub fn is_cached(self) -> bool {
        CACHED_STATES.contains(&self)
    }
}

/// Aggregate root: Shipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shipment {
    pub(crate) id: ShipmentId,
    pub(crate) tenant_id: Option<TenantId>,
    pub(crate) kind: ShipmentKind,
    pub(crate) company: Option<Company>,
    pub(crate) reference: String,
    pub(crate) state: ShipmentState,
    pub(crate) moves: Vec<ShipmentMove>,
    pub(crate) untaxed_amount_cache: Option<Decimal>,
    pub(crate) tax_amount_cache: Option<Decimal>,
    pub(crate) total_amount_cache: Option<Decimal>,
    pub(crate) version: u64,
    pub(crate) created: bool,
}

impl Shipment {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: ShipmentId) -> Self {
        Self {
            id,
            tenant_id: None,
            kind: ShipmentKind::default(),
            company: None,
            reference: String::new(),
            state: ShipmentState::Draft,
            moves: Vec::new(),
            untaxed_amount_cache: None,
            tax_amount_cache: None,
            total_amount_cache: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ShipmentId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn kind(&self) -> ShipmentKind {
        self.kind
    }

    pub fn company(&self) -> Option<&Company> {
        self.company.as_ref()
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn state(&self) -> ShipmentState {
        self.state
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn moves(&self) -> &[ShipmentMove] {
        &self.moves
    }

    pub fn find_move(&self, move_id: MoveId) -> Option<&StockMove> {
        self.moves
            .iter()
            .map(|m| &m.stock_move)
            .find(|m| m.id == move_id)
    }

    pub fn untaxed_amount_cache(&self) -> Option<Decimal> {
        self.untaxed_amount_cache
    }

    pub fn tax_amount_cache(&self) -> Option<Decimal> {
        self.tax_amount_cache
    }

    pub fn total_amount_cache(&self) -> Option<Decimal> {
        self.total_amount_cache
    }
}

impl AggregateRoot for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateShipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateShipment {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub kind: ShipmentKind,
    pub company: Company,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddMove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMove {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub role: MoveRole,
    pub stock_move: StockMove,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateMove (replace quantity, price, origin, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMove {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub role: MoveRole,
    pub stock_move: StockMove,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveMove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMove {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub move_id: MoveId,
    pub occurred_at: DateTime<Utc>,
}

/// Command shape shared by the bare lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StoreAmountsCache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreAmountsCache {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub amounts: ShipmentAmounts,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentCommand {
    CreateShipment(CreateShipment),
    AddMove(AddMove),
    UpdateMove(UpdateMove),
    RemoveMove(RemoveMove),
    Done(Transition),
    Cancel(Transition),
    ResetToDraft(Transition),
    StoreAmountsCache(StoreAmountsCache),
}

/// Event: ShipmentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentCreated {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub kind: ShipmentKind,
    pub company: Company,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MoveAdded / MoveUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveChanged {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub role: MoveRole,
    pub stock_move: StockMove,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MoveRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRemoved {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub move_id: MoveId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentDone / ShipmentCancelled / ShipmentReset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentTransitioned {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AmountsCached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountsCached {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub amounts: ShipmentAmounts,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentEvent {
    ShipmentCreated(ShipmentCreated),
    MoveAdded(MoveChanged),
    MoveUpdated(MoveChanged),
    MoveRemoved(MoveRemoved),
    ShipmentDone(ShipmentTransitioned),
    ShipmentCancelled(ShipmentTransitioned),
    ShipmentReset(ShipmentTransitioned),
    AmountsCached(AmountsCached),
}

impl Event for ShipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShipmentEvent::ShipmentCreated(_) => "stock.shipment.created",
            ShipmentEvent::MoveAdded(_) => "stock.shipment.move_added",
            ShipmentEvent::MoveUpdated(_) => "stock.shipment.move_updated",
            ShipmentEvent::MoveRemoved(_) => "stock.shipment.move_removed",
            ShipmentEvent::ShipmentDone(_) => "stock.shipment.done",
            ShipmentEvent::ShipmentCancelled(_) => "stock.shipment.cancelled",
            ShipmentEvent::ShipmentReset(_) => "stock.shipment.reset",
            ShipmentEvent::AmountsCached(_) => "stock.shipment.amounts_cached",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ShipmentEvent::ShipmentCreated(e) => e.occurred_at,
            ShipmentEvent::MoveAdded(e) | ShipmentEvent::MoveUpdated(e) => e.occurred_at,
            ShipmentEvent::MoveRemoved(e) => e.occurred_at,
            ShipmentEvent::ShipmentDone(e)
            | ShipmentEvent::ShipmentCancelled(e)
            | ShipmentEvent::ShipmentReset(e) => e.occurred_at,
            ShipmentEvent::AmountsCached(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Shipment {
    type Command = ShipmentCommand;
    type Event = ShipmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ShipmentEvent::ShipmentCreated(e) => {
                self.id = e.shipment_id;
                self.tenant_id = Some(e.tenant_id);
                self.kind = e.kind;
                self.company = Some(e.company.clone());
                self.reference = e.reference.clone();
                self.state = ShipmentState::Draft;
                self.created = true;
            }
            ShipmentEvent::MoveAdded(e) => {
                self.moves.push(ShipmentMove {
                    role: e.role,
                    stock_move: e.stock_move.clone(),
                });
            }
            ShipmentEvent::MoveUpdated(e) => {
                if let Some(slot) = self
                    .moves
                    .iter_mut()
                    .find(|m| m.stock_move.id == e.stock_move.id)
                {
                    slot.role = e.role;
                    slot.stock_move = e.stock_move.clone();
                }
            }
            ShipmentEvent::MoveRemoved(e) => {
                self.moves.retain(|m| m.stock_move.id != e.move_id);
            }
            ShipmentEvent::ShipmentDone(_) => {
                self.state = ShipmentState::Done;
                for m in &mut self.moves {
                    if m.stock_move.state != MoveState::Cancelled {
                        m.stock_move.state = MoveState::Done;
                    }
                }
            }
            ShipmentEvent::ShipmentCancelled(_) => {
                self.state = ShipmentState::Cancelled;
                for m in &mut self.moves {
                    m.stock_move.state = MoveState::Cancelled;
                }
            }
            ShipmentEvent::ShipmentReset(_) => {
                self.state = ShipmentState::Draft;
                for m in &mut self.moves {
                    m.stock_move.state = MoveState::Draft;
                }
            }
            ShipmentEvent::AmountsCached(e) => {
                self.untaxed_amount_cache = Some(e.amounts.untaxed_amount);
                self.tax_amount_cache = Some(e.amounts.tax_amount);
                self.total_amount_cache = Some(e.amounts.total_amount);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ShipmentCommand::CreateShipment(cmd) => self.handle_create(cmd),
            ShipmentCommand::AddMove(cmd) => self.handle_add_move(cmd),
            ShipmentCommand::UpdateMove(cmd) => self.handle_update_move(cmd),
            ShipmentCommand::RemoveMove(cmd) => self.handle_remove_move(cmd),
            ShipmentCommand::Done(cmd) => self.handle_done(cmd),
            ShipmentCommand::Cancel(cmd) => self.handle_cancel(cmd),
            ShipmentCommand::ResetToDraft(cmd) => self.handle_reset(cmd),
            ShipmentCommand::StoreAmountsCache(cmd) => self.handle_store_cache(cmd),
        }
    }
}

impl Shipment {
    fn ensure_target(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != shipment_id {
            return Err(DomainError::invariant("shipment_id mismatch"));
        }
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), DomainError> {
        if self.state != ShipmentState::Draft {
            return Err(DomainError::invariant(format!(
                "moves of a {:?} shipment cannot be modified",
                self.state
            )));
        }
        Ok(())
    }

    /// Checks that hold for a move in any shipment state.
    pub(crate) fn validate_values(stock_move: &StockMove) -> Result<(), DomainError> {
        if stock_move.quantity.is_sign_negative() {
            return Err(DomainError::validation("move quantity cannot be negative"));
        }
        if stock_move.unit_price.is_some_and(|p| p.is_sign_negative()) {
            return Err(DomainError::validation("move unit_price cannot be negative"));
        }
        if let Some(currency) = &stock_move.currency {
            currency.validate()?;
        }
        Ok(())
    }

    /// Checks for a move joining a draft shipment.
    pub(crate) fn validate_move(stock_move: &StockMove) -> Result<(), DomainError> {
        Self::validate_values(stock_move)?;
        if stock_move.state == MoveState::Done {
            return Err(DomainError::validation(
                "moves are done together with their shipment",
            ));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateShipment) -> Result<Vec<ShipmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("shipment already exists"));
        }
        if cmd.reference.trim().is_empty() {
            return Err(DomainError::validation("reference cannot be empty"));
        }
        cmd.company.currency.validate()?;
        Ok(vec![ShipmentEvent::ShipmentCreated(ShipmentCreated {
            tenant_id: cmd.tenant_id,
            shipment_id: cmd.shipment_id,
            kind: cmd.kind,
            company: cmd.company.clone(),
            reference: cmd.reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_move(&self, cmd: &AddMove) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.shipment_id)?;
        self.ensure_editable()?;
        Self::validate_move(&cmd.stock_move)?;
        if self.find_move(cmd.stock_move.id).is_some() {
            return Err(DomainError::conflict(format!(
                "move {} is already on the shipment",
                cmd.stock_move.id
            )));
        }
        Ok(vec![ShipmentEvent::MoveAdded(MoveChanged {
            tenant_id: cmd.tenant_id,
            shipment_id: cmd.shipment_id,
            role: cmd.role,
            stock_move: cmd.stock_move.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_move(&self, cmd: &UpdateMove) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.shipment_id)?;
        self.ensure_editable()?;
        Self::validate_move(&cmd.stock_move)?;
        if self.find_move(cmd.stock_move.id).is_none() {
            return Err(DomainError::not_found());
        }
        Ok(vec![ShipmentEvent::MoveUpdated(MoveChanged {
            tenant_id: cmd.tenant_id,
            shipment_id: cmd.shipment_id,
            role: cmd.role,
            stock_move: cmd.stock_move.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_move(&self, cmd: &RemoveMove) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.shipment_id)?;
        self.ensure_editable()?;
        if self.find_move(cmd.move_id).is_none() {
            return Err(DomainError::not_found());
        }
        Ok(vec![ShipmentEvent::MoveRemoved(MoveRemoved {
            tenant_id: cmd.tenant_id,
            shipment_id: cmd.shipment_id,
            move_id: cmd.move_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn transitioned(cmd: &Transition) -> ShipmentTransitioned {
        ShipmentTransitioned {
            tenant_id: cmd.tenant_id,
            shipment_id: cmd.shipment_id,
            occurred_at: cmd.occurred_at,
        }
    }

    fn handle_done(&self, cmd: &Transition) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.shipment_id)?;
        match self.state {
            ShipmentState::Draft => Ok(vec![ShipmentEvent::ShipmentDone(Self::transitioned(cmd))]),
            ShipmentState::Done => Err(DomainError::conflict("shipment is already done")),
            ShipmentState::Cancelled => Err(DomainError::invariant(
                "a cancelled shipment cannot be done",
            )),
        }
    }

    fn handle_cancel(&self, cmd: &Transition) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.shipment_id)?;
        match self.state {
            ShipmentState::Draft => Ok(vec![ShipmentEvent::ShipmentCancelled(Self::transitioned(
                cmd,
            ))]),
            ShipmentState::Cancelled => {
                Err(DomainError::conflict("shipment is already cancelled"))
            }
            ShipmentState::Done => {
                Err(DomainError::invariant("a done shipment cannot be cancelled"))
            }
        }
    }

    fn handle_reset(&self, cmd: &Transition) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.shipment_id)?;
        if self.state != ShipmentState::Cancelled {
            return Err(DomainError::invariant(
                "only cancelled shipments can be reset to draft",
            ));
        }
        Ok(vec![ShipmentEvent::ShipmentReset(Self::transitioned(cmd))])
    }

    fn handle_store_cache(
        &self,
        cmd: &StoreAmountsCache,
    ) -> Result<Vec<ShipmentEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.shipment_id)?;
        if !self.state.is_cached() {
            return Err(DomainError::invariant(format!(
                "amounts are only cached for done or cancelled shipments (state: {:?})",
                self.state
            )));
        }
        Ok(vec![ShipmentEvent::AmountsCached(AmountsCached {
            tenant_id: cmd.tenant_id,
            shipment_id: cmd.shipment_id,
            amounts: cmd.amounts.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
