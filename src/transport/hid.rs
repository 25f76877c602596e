use std::ffi::CString;
use std::fmt;
use std::time::Duration;

use hidapi::{
	HidApi,
	HidDevice,
};

use super::Transport;
use crate::mcp2221::report::{
	REPORT_SIZE,
	Request,
	Response,
};

/// A bridge found on the bus.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BridgeInfo {
	pub index: usize,
	pub product: String,
	pub path: CString,
}

impl fmt::Display for BridgeInfo {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "No.{} : {}", self.index, self.product)
	}
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DeviceSelector {
	Index(usize),
	Name(String),
}

impl fmt::Display for DeviceSelector {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			DeviceSelector::Index(index) => write!(f, "no.{}", index),
			DeviceSelector::Name(name) => write!(f, "'{}'", name),
		}
	}
}

pub fn list_bridges(api: &HidApi, vendor_id: u16, product_id: u16) -> Vec<BridgeInfo> {
	api.device_list()
		.filter(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
		.enumerate()
		.map(|(index, d)| BridgeInfo {
			index,
			product: d.product_string().unwrap_or("").to_string(),
			path: d.path().to_owned(),
		})
		.collect()
}

pub fn select_bridge<'a>(bridges: &'a [BridgeInfo], selector: &DeviceSelector) -> crate::AResult<&'a BridgeInfo> {
	ensure!(!bridges.is_empty(), "No target devices");
	match selector {
		DeviceSelector::Index(index) => {
			bridges.get(*index).ok_or_else(|| format_err!("No target no.{}", index))
		},
		DeviceSelector::Name(name) => {
			let mut named = bridges.iter().filter(|b| &b.product == name);
			let first = named.next().ok_or_else(|| format_err!("No devices named '{}'", name))?;
			ensure!(named.next().is_none(), "Some devices named '{}' exist, select one with --no", name);
			Ok(first)
		},
	}
}

/// An opened bridge; the handle is closed when this is dropped.
pub struct HidTransport {
	device: HidDevice,
	timeout: Duration,
}

impl HidTransport {
	pub fn open(api: &HidApi, bridge: &BridgeInfo, timeout: Duration) -> crate::AResult<Self> {
		let device = with_context!(("cannot open hid device no.{}", bridge.index), {
			Ok(api.open_path(&bridge.path)?)
		})?;
		debug!("opened hid device {:?}", bridge.path);
		Ok(HidTransport { device, timeout })
	}
}

impl Transport for HidTransport {
	fn send(&mut self, request: &Request) -> crate::AResult<()> {
		let written = self.device.write(request.as_bytes())?;
		ensure!(written == request.as_bytes().len(), "short hid write: {} of {} bytes", written, request.as_bytes().len());
		Ok(())
	}

	fn receive(&mut self) -> crate::AResult<Response> {
		let mut buf = [0u8; REPORT_SIZE];
		let len = self.device.read_timeout(&mut buf, self.timeout.as_millis() as i32)?;
		if len == 0 {
			warn!("no response from bridge within {:?}", self.timeout);
		}
		Ok(Response::from_slice(&buf[..len]))
	}
}

impl Drop for HidTransport {
	fn drop(&mut self) {
		debug!("closing hid device");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn bridges(names: &[&str]) -> Vec<BridgeInfo> {
		names.iter().enumerate().map(|(index, name)| BridgeInfo {
			index,
			product: name.to_string(),
			path: CString::new(format!("/dev/hidraw{}", index)).unwrap(),
		}).collect()
	}

	#[test]
	fn select_by_index() {
		let list = bridges(&["a", "b"]);
		assert_eq!(select_bridge(&list, &DeviceSelector::Index(1)).unwrap().product, "b");
		assert!(select_bridge(&list, &DeviceSelector::Index(2)).is_err());
	}

	#[test]
	fn select_by_unique_name() {
		let list = bridges(&["a", "b", "b"]);
		assert_eq!(select_bridge(&list, &DeviceSelector::Name("a".into())).unwrap().index, 0);
		assert!(select_bridge(&list, &DeviceSelector::Name("b".into())).is_err());
		assert!(select_bridge(&list, &DeviceSelector::Name("c".into())).is_err());
	}

	#[test]
	fn nothing_to_select() {
		assert!(select_bridge(&[], &DeviceSelector::Index(0)).is_err());
	}
}
