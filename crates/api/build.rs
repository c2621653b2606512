//! Build script for the API crate.
//!
//! Migrations are embedded by `sqlx::migrate!`, so a change to any file in
//! `migrations/` must trigger a rebuild.

fn main() {
    println!("cargo:rerun-if-changed=migrations");
}
