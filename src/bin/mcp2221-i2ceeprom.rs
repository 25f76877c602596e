#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate mcp2221_i2c_eeprom;
use mcp2221_i2c_eeprom::*;

use std::io;
use std::path::Path;
use std::process::exit;

use hidapi::HidApi;

use mcp2221_i2c_eeprom::config::{
	self,
	Config,
};
use mcp2221_i2c_eeprom::eeprom::{
	AddressWidth,
	Capacity,
	operations,
};
use mcp2221_i2c_eeprom::transport::{
	DeviceSelector,
	HidTransport,
	list_bridges,
	select_bridge,
};

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid paramater {}: {}", name, e);
		e.context(msg).into()
	})
}

fn get_offset(matches: &clap::ArgMatches) -> AResult<usize> {
	match matches.value_of("offset") {
		Some(p) => config::parse_offset(p).map_err(|e| format_err!("invalid paramater offset: {}", e)),
		None => Ok(0),
	}
}

fn get_count(matches: &clap::ArgMatches, name: &str) -> AResult<Option<usize>> {
	match matches.value_of(name) {
		Some(p) => config::parse_count(p).map_err(|e| format_err!("invalid paramater {}: {}", name, e)),
		None => Ok(None),
	}
}

fn load_config(matches: &clap::ArgMatches) -> AResult<Config> {
	let capacity: Capacity = get_param(matches, "romsize")?;
	let page: usize = get_param(matches, "page")?;
	let address_width: AddressWidth = get_param(matches, "addressbits")?;

	let mut config = Config::new(capacity, page, address_width)?;
	config.speed = get_param(matches, "speed")?;
	config.slave = get_param(matches, "slave")?;
	config.device = match matches.value_of("name") {
		_ if matches.is_present("no") => DeviceSelector::Index(get_param(matches, "no")?),
		Some(name) => DeviceSelector::Name(name.to_string()),
		None => DeviceSelector::Name(mcp2221::DEFAULT_PRODUCT_NAME.to_string()),
	};
	debug!("rom: {}", config.geometry);
	Ok(config)
}

fn list(config: &Config) -> AResult<()> {
	let api = HidApi::new()?;
	let bridges = list_bridges(&api, config.bridge.vendor_id, config.bridge.product_id);

	println!("Hid device list VID/PID = 0x{:04x}/0x{:04x}", config.bridge.vendor_id, config.bridge.product_id);
	println!("---------------------------------------");
	for bridge in &bridges {
		println!("{}", bridge);
	}
	println!("---------------------------------------");

	Ok(())
}

fn open(api: &HidApi, config: &Config) -> AResult<HidTransport> {
	let bridges = list_bridges(api, config.bridge.vendor_id, config.bridge.product_id);
	let bridge = select_bridge(&bridges, &config.device)?;
	info!("Selected device No.{}, product name = {}", bridge.index, bridge.product);
	HidTransport::open(api, bridge, config.read_timeout)
}

fn write(config: &Config, sub_m: &clap::ArgMatches) -> AResult<()> {
	let path = match sub_m.value_of("FILE") {
		Some(path) => Path::new(path),
		None => bail!("filename is required"),
	};
	let offset = get_offset(sub_m)?;
	let data = operations::load_source(path, get_count(sub_m, "size")?)?;
	eeprom::effective_length(config.geometry.total_size(), offset, Some(data.len()))?;

	let api = HidApi::new()?;
	let mut session = config.connect(open(&api, config)?)?;
	operations::write_with_progress(&mut session, &config.geometry, offset, &data, io::stdout())?;
	info!("write complete ({} bytes at 0x{:x})", data.len(), offset);

	Ok(())
}

fn read(config: &Config, sub_m: &clap::ArgMatches) -> AResult<()> {
	let offset = get_offset(sub_m)?;
	let length = eeprom::effective_length(config.geometry.total_size(), offset, get_count(sub_m, "size")?)?;
	let destination = match sub_m.value_of("FILE") {
		Some(path) => Some(operations::create_destination(Path::new(path))?),
		None => None,
	};

	let api = HidApi::new()?;
	let mut session = config.connect(open(&api, config)?)?;
	match destination {
		Some(file) => {
			operations::read_to_writer(&mut session, &config.geometry, offset, length, io::BufWriter::new(file), io::stdout())?;
		},
		None => {
			let stdout = io::stdout();
			operations::read_to_dump(&mut session, &config.geometry, offset, length, stdout.lock())?;
		},
	}
	info!("read complete ({} bytes at 0x{:x})", length, offset);

	Ok(())
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg no: --no +takes_value +global "target hid device's no. in the list (takes precedence over --name)")
		(@arg name: --name +takes_value +global "target hid device's product name [default: MCP2221 USB-I2C/UART Combo]")
		(@arg speed: --speed +takes_value +global default_value("400k") "i2c speed: 100k or 400k")
		(@arg slave: --slave +takes_value +global default_value("0x50") "i2c eeprom's slave address (7bit)")
		(@arg romsize: --romsize +takes_value +global default_value("2k") "eeprom's size in kbit: 1k, 2k, 4k, .. 512k")
		(@arg addressbits: --addressbits +takes_value +global default_value("8") "eeprom's address field length: 8 or 16 (16 is forced above 2k)")
		(@arg page: --page +takes_value +global default_value("8") "eeprom's page size in bytes: 4, 8, 16 or 32")
		(@subcommand list =>
			(about: "list connected MCP2221 devices")
		)
		(@subcommand write =>
			(about: "write a binary file to the eeprom")
			(@arg offset: --offset +takes_value "eeprom address to start at [default: 0]")
			(@arg size: --size +takes_value "number of bytes to write [default: file size]")
			(@arg FILE: +required "binary file to write, starting with its first byte")
		)
		(@subcommand read =>
			(about: "read the eeprom into a new file, or dump it as hex")
			(@arg offset: --offset +takes_value "eeprom address to start at [default: 0]")
			(@arg size: --size +takes_value "number of bytes to read [default: rest of the rom]")
			(@arg FILE: "file to create (must not exist); hex dump to stdout if omitted")
		)
	).get_matches();

	match matches.subcommand() {
		("list", Some(sub_m)) => {
			list(&load_config(sub_m)?)
		},
		("write", Some(sub_m)) => {
			write(&load_config(sub_m)?, sub_m)
		},
		("read", Some(sub_m)) => {
			read(&load_config(sub_m)?, sub_m)
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		match error_kind(&e) {
			Some(kind) if kind.is_transfer() => error!("Error: {} (operation aborted, bus cancelled)", e),
			_ => error!("Error: {}", e),
		}
		exit(1);
	}
}
