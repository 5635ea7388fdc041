use ghostwire::intent::{JsonFileStateStore, StoreSnapshot};
use std::path::Path;

/// Print the cached registration and membership facts
pub async fn execute(state_path: &Path) -> Result<StoreSnapshot, Box<dyn std::error::Error>> {
    println!("📊 Ghostwire State");
    println!("File: {}", state_path.display());
    println!();

    let snapshot = JsonFileStateStore::read_snapshot(state_path).await?;

    println!("Registered users: {}", snapshot.registered.len());
    for user in &snapshot.registered {
        let rooms = snapshot.joined_rooms(user);
        println!("  {} (joined {} rooms)", user, rooms.len());
    }

    println!();
    println!("Rooms: {}", snapshot.memberships.len());
    for (room, members) in &snapshot.memberships {
        println!("  {}", room);
        for (user, membership) in members {
            println!("    {} {}", membership, user);
        }
    }

    Ok(snapshot)
}
