//! tally-backfill - Run idempotent migration backfills.

fn main() -> std::process::ExitCode {
    tally::cmd::backfill::main()
}
