use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("agentcarrier {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: agentcarrier");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("AGENTCARRIER_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "frame: header={} bytes, version={}, max_payload={}",
        agentcarrier_frame::HEADER_SIZE,
        agentcarrier_frame::codec::VERSION,
        agentcarrier_frame::DEFAULT_MAX_PAYLOAD
    );
    println!(
        "backends: {}",
        agentcarrier_transport::Backend::ALL
            .iter()
            .map(|backend| backend.tag())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "features: delivery={}, async={}, cli=true",
        cfg!(feature = "delivery"),
        cfg!(feature = "async")
    );

    Ok(SUCCESS)
}
