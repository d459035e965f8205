use crate::core::{AppConfig, DirectoryClient, LocalStorage};
use crate::routes::portal_desk_routes;
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{dev::Server, web::Data, App, HttpServer};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

pub struct PortalDeskWebServer {
    port: u16,
    server: Server,
}

impl PortalDeskWebServer {
    pub async fn build(configuration: AppConfig) -> Result<Self, anyhow::Error> {
        let address = format!(
            "{}:{}",
            configuration.portal_desk_server_config.host,
            configuration.portal_desk_server_config.port
        );

        let mysql_pool = MySqlPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect_lazy_with(configuration.mysql.connect());

        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let server = run(listener, mysql_pool, configuration).await?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub async fn run(
    listener: TcpListener,
    mysql_pool: MySqlPool,
    configuration: AppConfig,
) -> Result<Server, anyhow::Error> {
    let mysql_pool = Data::new(mysql_pool);
    let directory_client = Data::new(DirectoryClient::new(&configuration.directory)?);
    let storage = Data::new(LocalStorage::new(&configuration.storage.root_dir));

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allowed_headers(vec![
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::ACCEPT,
            ])
            .supports_credentials();
        App::new()
            .configure(portal_desk_routes)
            .app_data(mysql_pool.clone())
            .app_data(directory_client.clone())
            .app_data(storage.clone())
            .wrap(TracingLogger::default())
            .wrap(cors)
    })
    .listen(listener)?
    .run();

    Ok(server)
}
