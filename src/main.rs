// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bluetooth Communicator
//!
//! Usage:
//!   bluetooth-communicator scan              (pick a device, remember it, connect)
//!   bluetooth-communicator select <ADDRESS>  (remember a device)
//!   bluetooth-communicator connect <ADDRESS>
//!   bluetooth-communicator tcp <HOST:PORT>
//!   bluetooth-communicator                   (uses the remembered device)

use anyhow::{anyhow, Result};
use std::env;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bluetooth_communicator::bluetooth::{
    select_device, BluetoothAdapter, ConnectionController, Connector, DeviceAddress,
    DeviceScanner, RfcommConnector, TcpConnector,
};
use bluetooth_communicator::config::Config;
use bluetooth_communicator::events::EventProcessor;
use bluetooth_communicator::state::AppState;

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bluetooth_communicator=info".parse()?),
        )
        .init();

    info!(
        "Starting Bluetooth Communicator v{}...",
        env!("CARGO_PKG_VERSION")
    );

    let mut config = Config::load()?;
    info!("Configuration loaded");

    let args: Vec<String> = env::args().collect();
    let mode = args.get(1).map(|s| s.as_str());
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    match mode {
        Some("scan") => {
            let adapter = BluetoothAdapter::open().await?;
            let Some(address) = scan_and_select(&mut config, &adapter, &mut input).await? else {
                return Ok(());
            };
            let connector = rfcomm_connector(&config, adapter);
            run_session(&config, connector, address, &mut input).await
        }
        Some("select") => {
            let address = required_address(&args)?;
            remember(&mut config, &address)
        }
        Some("connect") => {
            let address = required_address(&args)?;
            let connector = rfcomm_connector(&config, BluetoothAdapter::open().await?);
            run_session(&config, connector, address, &mut input).await
        }
        Some("tcp") => {
            let address = required_address(&args)?;
            run_session(&config, Arc::new(TcpConnector), address, &mut input).await
        }
        Some(other) => Err(anyhow!("Unknown command: {}", other)),
        None => {
            let address = config.device_address().ok_or_else(|| {
                anyhow!("No device address given and none remembered; run `scan` or `select` first")
            })?;
            let connector = rfcomm_connector(&config, BluetoothAdapter::open().await?);
            run_session(&config, connector, address, &mut input).await
        }
    }
}

fn required_address(args: &[String]) -> Result<DeviceAddress> {
    let raw = args
        .get(2)
        .ok_or_else(|| anyhow!("Missing device address"))?;
    Ok(DeviceAddress::new(raw.as_str())?)
}

fn remember(config: &mut Config, address: &DeviceAddress) -> Result<()> {
    config.remember_device(address);
    config.save()?;
    info!("Remembered device {}", address);
    Ok(())
}

fn rfcomm_connector(config: &Config, adapter: BluetoothAdapter) -> Arc<dyn Connector> {
    info!("RFCOMM connector on adapter {}", adapter.name());
    let connector = match config.bluetooth.rfcomm_channel {
        Some(channel) => RfcommConnector::with_channel(adapter, channel),
        None => RfcommConnector::new(adapter),
    };
    Arc::new(connector)
}

/// List nearby devices and let the user pick one. The pick is remembered.
async fn scan_and_select(
    config: &mut Config,
    adapter: &BluetoothAdapter,
    input: &mut Input,
) -> Result<Option<DeviceAddress>> {
    let scanner = DeviceScanner::new(adapter);
    let devices = scanner.scan(config.scan_duration()).await?;

    if devices.is_empty() {
        println!("No devices found");
        return Ok(None);
    }
    for (i, device) in devices.iter().enumerate() {
        println!("{:>3}. {}", i + 1, device.summary());
    }

    loop {
        print!("Select a device (number or address, empty to cancel): ");
        std::io::stdout().flush()?;

        let Some(line) = input.next_line().await? else {
            return Ok(None);
        };
        if line.trim().is_empty() {
            return Ok(None);
        }
        match select_device(&devices, &line) {
            Some(device) => {
                let address = DeviceAddress::new(device.address.as_str())?;
                println!("Selected {} ({})", device.name, address);
                remember(config, &address)?;
                return Ok(Some(address));
            }
            None => println!("No such device: {}", line.trim()),
        }
    }
}

async fn run_session(
    config: &Config,
    connector: Arc<dyn Connector>,
    address: DeviceAddress,
    input: &mut Input,
) -> Result<()> {
    let state = AppState::new();
    state.set_device_address(address.to_string());

    let (mut controller, mut events) = ConnectionController::new(connector, config.link_options());
    let mut processor = EventProcessor::new(state.clone(), std::io::stdout());

    if state.begin_connect() {
        controller.connect(address.clone()).await;
    }

    info!("Ready. Type a line to send it; /connect, /disconnect, /quit");

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                controller.on_event(&event).await;
                if let Err(e) = processor.process_event(&event) {
                    error!("Error processing event: {}", e);
                }
            }
            line = input.next_line() => {
                match line {
                    Ok(Some(line)) => match line.trim() {
                        "/quit" => break,
                        "/disconnect" => {
                            if state.begin_disconnect() {
                                controller.disconnect().await;
                            } else {
                                info!("Not connected");
                            }
                        }
                        "/connect" => {
                            if state.begin_connect() {
                                controller.connect(address.clone()).await;
                            } else {
                                info!("Already connected or connecting");
                            }
                        }
                        _ => {
                            if state.begin_send() {
                                controller.send(&line).await;
                            } else {
                                info!("Cannot send now ({})", state.get_connection_state().as_str());
                            }
                        }
                    },
                    Ok(None) => {
                        info!("Input closed");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    controller.disconnect().await;
    info!("Bluetooth Communicator stopped");
    Ok(())
}
