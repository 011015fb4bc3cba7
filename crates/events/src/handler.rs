use stockval_core::Aggregate;

/// Run a command against an aggregate: decide the events, then apply them.
///
/// On error the aggregate is left untouched, since `handle` never mutates.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
{
    let events = aggregate.handle(command)?;
    for ev in &events {
        aggregate.apply(ev);
    }
    Ok(events)
}
