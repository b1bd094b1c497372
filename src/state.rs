//! Session state management
//! This module defines the state shared by the tasks of one bridge session.

use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::BluetoothManager;
use crate::dashboard::DashboardState;

/// State of one running session
pub struct AppState {
    pub config: AppConfig,
    /// The Bluetooth manager instance
    pub bluetooth_manager: Arc<Mutex<BluetoothManager>>,
    /// Fired on Ctrl-C, on the quit key, or when a session task fails
    pub cancel_token: CancellationToken,
    dashboard_tx: watch::Sender<DashboardState>,
}

impl AppState {
    /// Creates a new AppState instance
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing BluetoothManager...");
        let manager = BluetoothManager::new(config.bluetooth.clone()).await?;
        let dashboard_state = DashboardState {
            angle_limit: config.arm.angle_limit,
            ..DashboardState::default()
        };
        Ok(Self {
            config,
            bluetooth_manager: Arc::new(Mutex::new(manager)),
            cancel_token: CancellationToken::new(),
            dashboard_tx: watch::channel(dashboard_state).0,
        })
    }

    /// Gets a reference to the Bluetooth manager
    pub fn get_bluetooth_manager_arc(&self) -> Arc<Mutex<BluetoothManager>> {
        self.bluetooth_manager.clone()
    }

    pub fn subscribe_dashboard(&self) -> watch::Receiver<DashboardState> {
        self.dashboard_tx.subscribe()
    }

    /// Logs a connection status change and mirrors it on the dashboard
    pub fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        info!("{}", status);
        self.dashboard_tx.send_modify(|state| state.status = status);
    }

    pub fn update_dashboard(&self, update: impl FnOnce(&mut DashboardState)) {
        self.dashboard_tx.send_modify(update);
    }
}
