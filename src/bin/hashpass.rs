//! Prints the argon2 PHC string for a password, for seeding `usuarios.password_hash`.

use anyhow::{Context, anyhow};

fn main() -> anyhow::Result<()> {
    let password = std::env::args()
        .nth(1)
        .context("usage: hashpass <password>")?;
    let phc = physiopro::auth::hash_password(&password).map_err(|e| anyhow!(e))?;
    println!("{phc}");
    Ok(())
}
