//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Labelmap.
//
// Labelmap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Labelmap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Labelmap. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use structopt::StructOpt;

use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    /// Run the IMAP server in the foreground.
    ///
    /// The server listens on the address configured in the `[imap]` section
    /// of `labelmap.toml` and handles every connection in this process.
    Serve(ServeSubcommand),
}

#[derive(StructOpt, Default)]
pub(super) struct ServeSubcommand {
    /// The directory containing `labelmap.toml` etc
    /// [default: /etc/labelmap or /usr/local/etc/labelmap]
    #[structopt(long, parse(from_os_str))]
    root: Option<PathBuf>,

    /// Log debug messages to standard error. Ignored if the root contains a
    /// `logging.toml`.
    #[structopt(long, short)]
    verbose: bool,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        },
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        },
    });

    match cmd {
        Command::Serve(cmd) => serve(cmd),
    }
}

fn serve(cmd: ServeSubcommand) {
    let root = cmd.root.unwrap_or_else(|| {
        if Path::new("/etc/labelmap/labelmap.toml").is_file() {
            "/etc/labelmap".to_owned().into()
        } else if Path::new("/usr/local/etc/labelmap/labelmap.toml").is_file()
        {
            "/usr/local/etc/labelmap".to_owned().into()
        } else {
            eprintln!(
                "Neither /etc/labelmap nor /usr/local/etc/labelmap looks\n\
                 like the Labelmap root; use --root=/path/to/labelmap if\n\
                 your installation is elsewhere."
            );
            EX_CONFIG.exit()
        }
    });

    let system_config_path = root.join("labelmap.toml");
    let mut system_config_toml = Vec::new();
    if let Err(e) = fs::File::open(&system_config_path)
        .and_then(|mut f| f.read_to_end(&mut system_config_toml))
    {
        eprintln!("Error reading '{}': {}", system_config_path.display(), e);
        EX_CONFIG.exit();
    }

    let system_config: SystemConfig =
        match toml::from_slice(&system_config_toml) {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Error in config file at '{}': {}",
                    system_config_path.display(),
                    e
                );
                EX_CONFIG.exit()
            },
        };

    let log_config_file = root.join("logging.toml");
    if log_config_file.is_file() {
        if let Err(e) = log4rs::init_file(
            &log_config_file,
            log4rs::file::Deserializers::new(),
        ) {
            eprintln!(
                "Error in logging config at '{}': {}",
                log_config_file.display(),
                e
            );
            EX_CONFIG.exit();
        }
    } else {
        crate::init_simple_log(cmd.verbose);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Unable to start the runtime: {}", e);
            EX_OSERR.exit()
        },
    };

    runtime.block_on(super::serve::imap(Arc::new(system_config)));
}
