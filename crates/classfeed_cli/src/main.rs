//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `classfeed_core` linkage.
//! - Optionally open a database file and report its schema version.

use classfeed_core::db::migrations::current_user_version;
use classfeed_core::db::open_db;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("classfeed_core ping={}", classfeed_core::ping());
    println!("classfeed_core version={}", classfeed_core::core_version());

    let Some(db_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match open_db(&db_path).and_then(|conn| current_user_version(&conn)) {
        Ok(version) => {
            println!("classfeed_core db={db_path} schema_version={version}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("classfeed_core db={db_path} error={err}");
            ExitCode::FAILURE
        }
    }
}
