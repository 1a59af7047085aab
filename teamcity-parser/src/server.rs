use std::future::Future;

use tokio::net::TcpListener;
use warehouse_common::warehouse::PgWarehouse;

use crate::config::Config;
use crate::router;
use crate::sinks::print::PrintSink;
use crate::sinks::warehouse::WarehouseSink;

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = if config.print_sink {
        // Print sink is only used for local debug
        router::router(
            PrintSink {},
            config.map_changes,
            config.export_prometheus,
            config.max_body_size,
        )
    } else {
        let warehouse = PgWarehouse::new(
            &config.warehouse_dataset,
            &config.warehouse_table,
            &config.database_url,
            config.max_pg_connections,
        )
        .expect("failed to create warehouse pool");

        router::router(
            WarehouseSink::new(warehouse),
            config.map_changes,
            config.export_prometheus,
            config.max_body_size,
        )
    };

    tracing::info!("listening on {:?}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
