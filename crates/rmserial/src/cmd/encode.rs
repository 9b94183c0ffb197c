use rmserial_frame::{ReceivePacket, SendPacket};

use crate::cmd::{EncodeArgs, EncodeCommand, EncodeReceiveArgs, EncodeSendArgs};
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    match args.command {
        EncodeCommand::Receive(args) => {
            print_encoded("receive", &receive_packet(&args).to_bytes(), format)
        }
        EncodeCommand::Send(args) => print_encoded("send", &send_packet(&args)?.to_bytes(), format),
    }
    Ok(SUCCESS)
}

fn receive_packet(args: &EncodeReceiveArgs) -> ReceivePacket {
    ReceivePacket::new(args.color, args.pitch, args.yaw).sealed()
}

fn send_packet(args: &EncodeSendArgs) -> CliResult<SendPacket> {
    let [x, y, z] = triple("--position", &args.position)?;
    let [vx, vy, vz] = triple("--velocity", &args.velocity)?;
    Ok(SendPacket {
        target_found: args.found,
        target_color: args.target_color,
        task_mode: args.task_mode,
        x,
        y,
        z,
        vx,
        vy,
        vz,
        checksum: 0,
    }
    .sealed())
}

fn triple(flag: &str, values: &[f32]) -> CliResult<[f32; 3]> {
    <[f32; 3]>::try_from(values).map_err(|_| {
        CliError::new(
            USAGE,
            format!("{flag} takes exactly 3 comma-separated values (got {})", values.len()),
        )
    })
}
