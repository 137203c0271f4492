// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    error::Error,
    io::{self, Write},
    time::Duration,
};

use futures::{executor, stream::StreamExt};
use tracing_subscriber::EnvFilter;

use bluetooth_discovery::{
    api::{channel_subscriber, AdapterHandle, CapabilityProfile, PermissionAuthority},
    emulator::{EmulatedAdapter, EmulatedAuthority},
    ClassicAddress, Device, DiscoverySession, SessionConfig,
};

const SCAN_INTERVAL: Duration = Duration::from_millis(400);

fn nearby_devices() -> Vec<Device> {
    vec![
        Device::named(ClassicAddress::from(0x0C_1D_AF_10_22_01), "Pocket Cinema Camera"),
        Device::new(ClassicAddress::from(0x5C_F3_70_8A_41_7E), None),
        Device::named(ClassicAddress::from(0x0C_1D_AF_10_22_01), "Pocket Cinema Camera"),
        Device::named(ClassicAddress::from(0x00_1A_7D_DA_71_13), "Serial Adapter"),
    ]
}

fn paired_devices() -> Vec<Device> {
    vec![Device::named(ClassicAddress::from(0x00_1A_7D_DA_71_13), "Serial Adapter")]
}

/// Ask for an index into the device list. Empty input skips connecting.
fn get_user_selection(count: usize) -> Result<Option<usize>, Box<dyn Error>> {
    let mut buffer = String::new();
    loop {
        print!("Select a device to connect to (enter to skip): ");
        io::stdout().flush()?;
        buffer.clear();
        if io::stdin().read_line(&mut buffer)? == 0 {
            break Ok(None);
        }

        let input = buffer.trim();
        if input.is_empty() {
            break Ok(None);
        }
        match input.parse::<usize>() {
            Ok(val) if val < count => break Ok(Some(val)),
            _ => println!("Please enter a valid digit."),
        }
    }
}

fn print_devices<A, P>(session: &DiscoverySession<A, P>, devices: &[Device])
where
    A: AdapterHandle + 'static,
    P: PermissionAuthority + 'static,
{
    for (index, device) in devices.iter().enumerate() {
        println!(
            "{}: {} ({})",
            index,
            session.resolve_display_name(device),
            device.address()
        );
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let adapter = EmulatedAdapter::builder()
        .bonded(paired_devices())
        .script(nearby_devices(), SCAN_INTERVAL)
        .build();
    let profile = CapabilityProfile::default();
    let authority = EmulatedAuthority::granting(profile.requested());
    let session = DiscoverySession::with_config(
        adapter,
        authority,
        SessionConfig::default().with_capability_profile(profile),
    );

    println!("Adapter status: {:?}", session.adapter_status());
    println!("Paired devices:");
    print_devices(&session, &session.paired_devices());

    let (subscriber, mut updates) = channel_subscriber();
    session.start(subscriber)?;
    println!("Scanning for devices...");

    // The stream ends once the inquiry finishes and the session lets go of
    // the subscriber.
    let devices = executor::block_on(async {
        let mut latest = Vec::new();
        while let Some(devices) = updates.next().await {
            println!("Found {} device(s)", devices.len());
            latest = devices;
        }
        latest
    });
    println!("Done scanning");

    if devices.is_empty() {
        return Ok(());
    }
    print_devices(&session, &devices);

    if let Some(index) = get_user_selection(devices.len())? {
        let device = &devices[index];
        let name = session.resolve_display_name(device);
        if executor::block_on(session.attempt_connect(device)) {
            println!("Connecting to {}...", name);
        } else {
            println!("Failed to connect");
        }
    }

    Ok(())
}
