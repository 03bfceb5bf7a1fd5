//! tally-reconcile - Recompute paid, remaining and status for ledger entries.

fn main() -> std::process::ExitCode {
    tally::cmd::reconcile::main()
}
