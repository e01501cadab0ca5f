//! Subscribing to derived streams and watching them react to commands.

use contactfold::{Channel, ContactKind, Direction, Store};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut store = Store::builder(dir.path().join("crm-events.json"))
        .recent_limit(2)
        .open()?;

    let leads = store.leads_stream().subscribe(|leads| {
        let names: Vec<_> = leads.iter().map(|c| c.name.as_str()).collect();
        println!("  leads: {names:?}");
    });
    let _customers = store.customers_stream().subscribe(|customers| {
        println!("  customers: {}", customers.len());
    });
    let _recent = store.recent_communications_stream().subscribe(|recent| {
        let contents: Vec<_> = recent.iter().map(|c| c.content.as_str()).collect();
        println!("  recent: {contents:?}");
    });

    println!("initialize");
    store.initialize()?;

    println!("add Alice");
    let alice = store.add_contact("Alice", "alice@example.com", ContactKind::Lead)?;
    println!("add Bob");
    store.add_contact("Bob", "bob@example.com", ContactKind::Lead)?;

    for note in ["first call", "follow-up", "proposal sent"] {
        println!("record {note:?}");
        store.record_communication(alice.id, Channel::Call, note, Direction::Outbound)?;
    }

    leads.unsubscribe();
    println!("promote Alice (leads observer gone)");
    store.promote_lead_to_customer(alice.id)?;

    for activity in store.contact_activity_stream().get().unwrap_or_default() {
        let last = activity
            .last_communication
            .map(|c| c.content)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}: {} communications, last {last:?}",
            activity.contact.name,
            activity.communications.len()
        );
    }

    Ok(())
}
