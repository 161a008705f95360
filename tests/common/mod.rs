//! Shared fixtures for the integration tests: two telegrams captured from
//! real meters (an ESMR 5.0 single-phase meter with a gas sub-meter, and a
//! three-phase DSMR 4.2 KAIFA meter), plus helpers to frame test bodies.

// Not every test crate uses every fixture
#![allow(dead_code)]

use p1mqtt_rs::p1::checksum::crc16;

/// ESMR 5.0 telegram with fields on channels 0, 1 and 3. The embedded
/// checksum 8F46 is the meter's own.
pub const TELEGRAM_ESMR5: &str = "/Ene5\\XS210 ESMR 5.0\n\
\n\
1-3:0.2.8(50)\n\
0-0:1.0.0(171105201324W)\n\
0-0:96.1.1(4530303437303030303037363330383137)\n\
1-0:1.8.1(000051.775*kWh)\n\
1-0:1.8.2(000000.000*kWh)\n\
1-0:2.8.1(000024.413*kWh)\n\
1-0:2.8.2(000000.000*kWh)\n\
0-0:96.14.0(0001)\n\
1-0:1.7.0(00.335*kW)\n\
1-0:2.7.0(00.000*kW)\n\
0-0:96.7.21(00003)\n\
0-0:96.7.9(00001)\n\
1-0:99.97.0(0)(0-0:96.7.19)\n\
1-0:32.32.0(00002)\n\
1-0:32.36.0(00000)\n\
0-0:96.13.0()\n\
1-0:32.7.0(229.0*V)\n\
1-0:31.7.0(001*A)\n\
1-0:21.7.0(00.335*kW)\n\
1-0:22.7.0(00.000*kW)\n\
0-1:24.1.0(003)\n\
0-1:96.1.0(4730303538353330303031313633323137)\n\
0-1:24.2.1(171105201000W)(00016.713*m3)\n\
!8F46\n";

/// Three-phase DSMR 4.2 telegram with a one-entry power failure log.
pub const TELEGRAM_KAIFA: &str = "/KFM5KAIFA-METER\n\
\n\
1-3:0.2.8(42)\n\
0-0:1.0.0(170124213128W)\n\
0-0:96.1.1(4530303236303030303234343934333135)\n\
1-0:1.8.1(000306.946*kWh)\n\
1-0:1.8.2(000210.088*kWh)\n\
1-0:2.8.1(000000.000*kWh)\n\
1-0:2.8.2(000000.000*kWh)\n\
0-0:96.14.0(0001)\n\
1-0:1.7.0(02.793*kW)\n\
1-0:2.7.0(00.000*kW)\n\
0-0:96.7.21(00001)\n\
0-0:96.7.9(00001)\n\
1-0:99.97.0(1)(0-0:96.7.19)(000101000006W)(2147483647*s)\n\
1-0:32.32.0(00000)\n\
1-0:52.32.0(00000)\n\
1-0:72.32.0(00000)\n\
1-0:32.36.0(00000)\n\
1-0:52.36.0(00000)\n\
1-0:72.36.0(00000)\n\
0-0:96.13.1()\n\
0-0:96.13.0()\n\
1-0:31.7.0(003*A)\n\
1-0:51.7.0(005*A)\n\
1-0:71.7.0(005*A)\n\
1-0:21.7.0(00.503*kW)\n\
1-0:41.7.0(01.100*kW)\n\
1-0:61.7.0(01.190*kW)\n\
1-0:22.7.0(00.000*kW)\n\
1-0:42.7.0(00.000*kW)\n\
1-0:62.7.0(00.000*kW)\n\
0-1:24.1.0(003)\n\
0-1:96.1.0(4730303331303033333738373931363136)\n\
0-1:24.2.1(170124210000W)(00671.790*m3)\n\
!29ED\n";

/// Converts a fixture (with `\n` line endings for readability) into the
/// CR LF framed bytes that appear on the wire.
pub fn wire_bytes(fixture: &str) -> Vec<u8> {
    fixture.replace('\n', "\r\n").into_bytes()
}

/// Frames an arbitrary telegram body, computing its checksum. The body must
/// start with the `/` identification line and use `\n` line endings.
pub fn frame_body(body: &str) -> Vec<u8> {
    let mut bytes = body.replace('\n', "\r\n").into_bytes();
    bytes.push(b'!');
    let checksum = crc16(&bytes);
    bytes.extend_from_slice(format!("{checksum:04X}\r\n").as_bytes());
    bytes
}
