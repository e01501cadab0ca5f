//! Closing and reopening a store rebuilds the same state from the log.

use contactfold::{Channel, ContactKind, Direction, EventType, Store};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("crm-events.json");

    let before = {
        let mut store = Store::open(&path)?;
        store.initialize()?;
        let ada = store.add_contact("Ada", "ada@example.com", ContactKind::Lead)?;
        store.record_communication(ada.id, Channel::Meeting, "Intro meeting", Direction::Outbound)?;
        store.promote_lead_to_customer(ada.id)?;
        println!("First session wrote {} events", store.events().len());
        store.state()
    };

    // The first store released its lock when it was dropped.
    let mut store = Store::open(&path)?;
    let after = store.initialize()?;
    println!("Second session replayed {} events", store.events().len());
    println!("State matches: {}", before == after);

    let grace = store.add_contact("Grace", "grace@example.com", ContactKind::Lead)?;
    println!("New contact gets id {} (ids continue past the log)", grace.id);

    println!(
        "Contact updates in the log: {}",
        store.events_by_type(EventType::ContactUpdated).len()
    );
    println!("\nOn disk:\n{}", std::fs::read_to_string(&path)?);

    Ok(())
}
