use std::io::{ErrorKind, Read};

use rmserial_frame::{crc, FrameError, FrameReader, SendPacket, CRC_SIZE};
use rmserial_transport::{MemoryTransport, SerialTransport, TransportError};
use tracing::warn;

use crate::cmd::{DecodeArgs, DecodeKind};
use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_records, DecodeOutcome, DecodeRecord, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let text = read_input(&args)?;
    let bytes = parse_hex(&text)?;

    let (records, trailing) = match args.kind {
        DecodeKind::Receive => decode_receive(&bytes)?,
        DecodeKind::Send => decode_send(&bytes),
    };
    print_records(&records, format);

    if trailing > 0 {
        warn!(trailing, "incomplete frame at end of input");
    }
    let dropped = records.iter().filter(|r| !r.outcome.is_valid()).count();
    if dropped > 0 || trailing > 0 {
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}

fn read_input(args: &DecodeArgs) -> CliResult<String> {
    if !args.hex.is_empty() {
        return Ok(args.hex.join(""));
    }
    if let Some(path) = &args.file {
        return std::fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(text)
}

/// Parse hex digits, ignoring whitespace and `:`/`,` separators.
pub fn parse_hex(text: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':' && *b != b',')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex input has an odd number of digits ({})", digits.len()),
        ));
    }

    digits
        .chunks_exact(2)
        .map(|pair| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(hi), Some(lo)) => Ok((hi << 4) | lo),
            _ => Err(CliError::new(
                USAGE,
                format!("invalid hex digits {:?}", String::from_utf8_lossy(pair)),
            )),
        })
        .collect()
}

fn nibble(digit: u8) -> Option<u8> {
    char::from(digit).to_digit(16).map(|value| value as u8)
}

/// Run the stream through the same framing reader the bridge uses.
/// Returns the records and the count of bytes left in an incomplete frame.
fn decode_receive(bytes: &[u8]) -> CliResult<(Vec<DecodeRecord>, usize)> {
    let transport = MemoryTransport::with_input(bytes);
    transport
        .open()
        .map_err(|err| transport_error("decode failed", err))?;
    let mut reader = FrameReader::new(&transport);
    let mut records = Vec::new();

    loop {
        let offset = bytes.len() - transport.pending_input();
        let outcome = match reader.read_packet() {
            Ok(packet) => DecodeOutcome::receive(&packet),
            Err(FrameError::InvalidHeader(byte)) => DecodeOutcome::InvalidHeader {
                byte: format!("{byte:#04x}"),
            },
            Err(FrameError::CrcMismatch { computed, received }) => DecodeOutcome::CrcError {
                computed: format!("{computed:#06x}"),
                received: format!("{received:#06x}"),
            },
            Err(FrameError::Transport(TransportError::Io(err)))
                if err.kind() == ErrorKind::UnexpectedEof =>
            {
                return Ok((records, bytes.len() - offset));
            }
            Err(err) => return Err(frame_error("decode failed", err)),
        };
        let end = bytes.len() - transport.pending_input();
        records.push(DecodeRecord {
            offset,
            outcome,
            bytes: bytes[offset..end].to_vec(),
        });
    }
}

/// Host-to-controller frames carry no sentinel; they are read back to back.
fn decode_send(bytes: &[u8]) -> (Vec<DecodeRecord>, usize) {
    let chunks = bytes.chunks_exact(SendPacket::SIZE);
    let trailing = chunks.remainder().len();

    let records = chunks
        .enumerate()
        .map(|(index, chunk)| {
            let outcome = match SendPacket::decode(chunk) {
                Ok(packet) if crc::verify(chunk) => DecodeOutcome::send(&packet),
                _ => DecodeOutcome::CrcError {
                    computed: format!("{:#06x}", crc::compute(&chunk[..chunk.len() - CRC_SIZE])),
                    received: format!("{:#06x}", crc::trailing(chunk).unwrap_or_default()),
                },
            };
            DecodeRecord {
                offset: index * SendPacket::SIZE,
                outcome,
                bytes: chunk.to_vec(),
            }
        })
        .collect();
    (records, trailing)
}
