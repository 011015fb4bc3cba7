use std::hint::black_box;

use chrono::Utc;
use criterion::{Criterion, criterion_group, criterion_main};
use rust_decimal::Decimal;

use stockval_accounting::{StandardTaxEngine, Tax};
use stockval_core::{AggregateId, Currency, TenantId};
use stockval_events::execute;
use stockval_stock::{
    AddMove, Company, CreateShipment, MoveOrigin, MoveRole, OriginKind, OriginLine, Shipment,
    ShipmentCommand, ShipmentId, ShipmentKind, StockConfiguration, StockMove, ValuationContext,
};

fn shipment_with_moves(count: i64) -> Shipment {
    let tenant_id = TenantId::new();
    let shipment_id = ShipmentId::new(AggregateId::new());
    let mut shipment = Shipment::empty(shipment_id);
    let eur = Currency::new("EUR", 2);
    let taxes = vec![
        Tax::percentage("VAT", Decimal::new(21, 2)),
        Tax::fixed("Eco", Decimal::new(5, 2)),
    ];

    let create = ShipmentCommand::CreateShipment(CreateShipment {
        tenant_id,
        shipment_id,
        kind: ShipmentKind::Outgoing,
        company: Company::new("Bench", eur.clone()),
        reference: "BENCH".to_string(),
        occurred_at: Utc::now(),
    });
    execute(&mut shipment, &create).expect("create");

    for i in 0..count {
        let price = Decimal::new(1_000 + i * 7, 2);
        let stock_move = StockMove::new(format!("p{i}"), Decimal::from(i % 9 + 1), Some(price))
            .with_currency(eur.clone())
            .with_origin(MoveOrigin::Line(OriginLine {
                kind: OriginKind::SaleLine,
                reference: format!("SO/{i}"),
                unit_price: Some(price),
                gross_unit_price: None,
                discount: None,
                taxes: taxes.clone(),
            }));
        let add = ShipmentCommand::AddMove(AddMove {
            tenant_id,
            shipment_id,
            role: MoveRole::Outgoing,
            stock_move,
            occurred_at: Utc::now(),
        });
        execute(&mut shipment, &add).expect("add move");
    }
    shipment
}

fn bench_calc_amounts(c: &mut Criterion) {
    let config = StockConfiguration {
        valued_origin: true,
    };
    let engine = StandardTaxEngine;
    let ctx = ValuationContext::new(&config, &engine);

    for count in [10, 200] {
        let shipment = shipment_with_moves(count);
        c.bench_function(&format!("calc_amounts/{count}_moves"), |b| {
            b.iter(|| black_box(shipment.calc_amounts(black_box(&ctx)).expect("valuation")))
        });
    }
}

criterion_group!(benches, bench_calc_amounts);
criterion_main!(benches);
