use colored::Colorize;
use portal_desk::core::AppConfig;
use portal_desk::db::roles;
use sqlx::mysql::MySqlPoolOptions;

/// Grants a role to a user from the command line, bypassing the HTTP layer.
/// Meant for bootstrapping the first administrator on a fresh database.
#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let (email, role) = match (args.next(), args.next()) {
        (Some(email), Some(role)) => (email, role),
        _ => {
            eprintln!("{}", "Usage: assign_role <email> <role>".yellow());
            std::process::exit(2);
        }
    };

    let configuration = AppConfig::new().expect("Failed to read configuration.");

    let pool = MySqlPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect_lazy_with(configuration.mysql.connect());

    match roles::assign_role_by_email(&pool, &email, &role).await {
        Ok(()) => {
            println!(
                "{}",
                format!("Role '{}' assigned to {}", role, email).green()
            );
        }
        Err(error) => {
            eprintln!(
                "{}",
                format!("Failed to assign role: {}", error.message()).red()
            );
            std::process::exit(1);
        }
    }
}
