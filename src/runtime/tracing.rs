/// Initializes structured logging for a node.
///
/// Output is compact and filtered by `RUST_LOG`, defaulting to `info`:
/// - `RUST_LOG=debug` - Every envelope crossing the mailbox
/// - `RUST_LOG=actor_mesh=trace` - Unrouted messages and dispatcher detail
///
/// Calling it twice is harmless; the second subscriber is ignored.
///
/// # Example
///
/// ```ignore
/// setup_tracing();
/// tracing::info!("Node starting");
/// ```
pub fn setup_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
