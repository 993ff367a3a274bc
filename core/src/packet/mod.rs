//! Wire format of the probe downlink.
//!
//! One packet per line: `<n,lat,lng,alt,pres,temp,ax,ay,az,gx,gy,gz,mx,my,mz,parachute>`.

pub mod decoder;
pub mod framer;
pub mod record;

pub use decoder::{decode_packet, DecodeError, FIELD_COUNT};
pub use framer::LineFramer;
pub use record::{TelemetryRecord, Vector3};
