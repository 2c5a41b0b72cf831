use anyhow::{Context, Result};
use listenfd::ListenFd;
use socket2::{Domain, Socket, Type};
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;
use tracing::info;

use adsync_types::models::ServerConfig;

const BACKLOG: i32 = 1024;

fn listen_addr(server: &ServerConfig, port: u16) -> Result<SocketAddr> {
    let host = server.get_bind_address();
    let ip: IpAddr = host.parse().with_context(|| format!("invalid bind address '{host}'"))?;
    Ok(SocketAddr::new(ip, port))
}

/// A systemd-passed socket if there is one, otherwise a fresh SO_REUSEPORT bind
/// so a replacement daemon can start before the old one exits.
pub async fn create_listener(port: u16, server: &ServerConfig) -> Result<TcpListener> {
    if let Some(inherited) = ListenFd::from_env().take_tcp_listener(0)? {
        inherited.set_nonblocking(true)?;
        info!("Serving on inherited socket");
        return Ok(TcpListener::from_std(inherited)?);
    }

    let addr = listen_addr(server, port)?;
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into()).with_context(|| format!("cannot bind {addr}"))?;
    socket.listen(BACKLOG)?;
    info!("Listening on {}", addr);

    Ok(TcpListener::from_std(socket.into())?)
}

/// Completes on Ctrl+C, or SIGTERM on unix. A running sync is not awaited.
/// A source whose handler cannot be installed never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                tracing::error!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown requested, in-flight sync runs are abandoned");
}
