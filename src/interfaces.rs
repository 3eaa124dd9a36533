use std::collections::BTreeSet;

use network_interface::{NetworkInterface, NetworkInterfaceConfig};

/// Names of the network interfaces present on this host, sorted and without duplicates.
///
/// An interface with several addresses is reported once per address by the OS, hence the set.
pub fn list_interfaces() -> Vec<String> {
    match NetworkInterface::show() {
        Ok(devices) => unique_names(devices.into_iter().map(|device| device.name)),
        Err(err) => {
            tracing::debug!(error = %err, "cannot enumerate network interfaces");
            Vec::new()
        }
    }
}

fn unique_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    names
        .into_iter()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}
