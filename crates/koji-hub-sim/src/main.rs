use std::sync::Arc;

use koji_hub_sim::SimState;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let state = Arc::new(SimState::new());
    state.push_build(101, "kernel", "6.8.1", "1.fc41", Some("2024-03-20 12:00:00"));
    state.push_build(102, "bash", "5.2.26", "3.fc41", Some("2024-03-21 09:30:00"));
    state.push_task(9001, "build", 2, Some("alice"));
    state.push_task(9002, "newRepo", 1, None);
    state.put_log(9001, "task.log", "task started\ntask finished\n");

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("hub listening on http://{addr}/kojihub");
    koji_hub_sim::run(listener, state).await
}
