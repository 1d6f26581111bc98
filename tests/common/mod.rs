#![allow(dead_code)]

//! Synthetic EXIF fixtures: big-endian TIFF structures, optionally wrapped in
//! a minimal JPEG (SOI, APP1 "Exif", EOI), PNG (eXIf chunk) or WebP (EXIF chunk).

pub const TAG_ORIENTATION: u16 = 0x0112;
pub const TAG_DATE_TIME: u16 = 0x0132;
pub const TAG_GPS_IFD: u16 = 0x8825;

pub const GPS_LATITUDE_REF: u16 = 0x0001;
pub const GPS_LATITUDE: u16 = 0x0002;
pub const GPS_LONGITUDE_REF: u16 = 0x0003;
pub const GPS_LONGITUDE: u16 = 0x0004;
pub const GPS_ALTITUDE_REF: u16 = 0x0005;
pub const GPS_ALTITUDE: u16 = 0x0006;

#[derive(Debug, Clone)]
pub enum Val {
    Byte(Vec<u8>),
    Ascii(String),
    Short(u16),
    Long(u32),
    Rational(Vec<(u32, u32)>),
}

impl Val {
    /// (型コード, 要素数, 値のバイト列)
    fn encode(&self) -> (u16, u32, Vec<u8>) {
        match self {
            Val::Byte(v) => (1, v.len() as u32, v.clone()),
            Val::Ascii(s) => {
                let mut bytes = s.as_bytes().to_vec();
                bytes.push(0);
                (2, bytes.len() as u32, bytes)
            }
            Val::Short(v) => (3, 1, v.to_be_bytes().to_vec()),
            Val::Long(v) => (4, 1, v.to_be_bytes().to_vec()),
            Val::Rational(v) => {
                let bytes = v
                    .iter()
                    .flat_map(|(n, d)| n.to_be_bytes().into_iter().chain(d.to_be_bytes()))
                    .collect();
                (5, v.len() as u32, bytes)
            }
        }
    }
}

pub type Dms = [(u32, u32); 3];

#[derive(Debug, Clone, Default)]
pub struct ExifFixture {
    primary: Vec<(u16, Val)>,
    gps: Vec<(u16, Val)>,
}

impl ExifFixture {
    pub fn new() -> Self {
        Self::default().primary(TAG_ORIENTATION, Val::Short(1))
    }

    pub fn primary(mut self, tag: u16, val: Val) -> Self {
        self.primary.push((tag, val));
        self
    }

    pub fn gps(mut self, tag: u16, val: Val) -> Self {
        self.gps.push((tag, val));
        self
    }

    pub fn latitude(self, dms: Dms, reference: &str) -> Self {
        self.gps(GPS_LATITUDE_REF, Val::Ascii(reference.to_string()))
            .gps(GPS_LATITUDE, Val::Rational(dms.to_vec()))
    }

    pub fn longitude(self, dms: Dms, reference: &str) -> Self {
        self.gps(GPS_LONGITUDE_REF, Val::Ascii(reference.to_string()))
            .gps(GPS_LONGITUDE, Val::Rational(dms.to_vec()))
    }

    pub fn altitude(self, value: (u32, u32), below_sea_level: bool) -> Self {
        self.gps(GPS_ALTITUDE_REF, Val::Byte(vec![below_sea_level as u8]))
            .gps(GPS_ALTITUDE, Val::Rational(vec![value]))
    }

    pub fn date_time(self, value: &str) -> Self {
        self.primary(TAG_DATE_TIME, Val::Ascii(value.to_string()))
    }

    pub fn tiff(&self) -> Vec<u8> {
        let mut primary = self.primary.clone();
        if !self.gps.is_empty() {
            // 値は後で埋めるが、インライン値なのでIFDのサイズは変わらない
            primary.push((TAG_GPS_IFD, Val::Long(0)));
        }
        primary.sort_by_key(|(tag, _)| *tag);

        let ifd0_offset = 8u32;
        let ifd0_len = encode_ifd(&primary, ifd0_offset).len() as u32;
        let gps_offset = ifd0_offset + ifd0_len;

        for entry in primary.iter_mut() {
            if entry.0 == TAG_GPS_IFD {
                entry.1 = Val::Long(gps_offset);
            }
        }

        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"MM\x00\x2a");
        tiff.extend_from_slice(&ifd0_offset.to_be_bytes());
        tiff.extend(encode_ifd(&primary, ifd0_offset));

        if !self.gps.is_empty() {
            let mut gps = self.gps.clone();
            gps.sort_by_key(|(tag, _)| *tag);
            tiff.extend(encode_ifd(&gps, gps_offset));
        }
        tiff
    }

    pub fn jpeg(&self) -> Vec<u8> {
        let tiff = self.tiff();
        let segment_len = (2 + 6 + tiff.len()) as u16;

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
        jpeg.extend_from_slice(&segment_len.to_be_bytes());
        jpeg.extend_from_slice(b"Exif\x00\x00");
        jpeg.extend(tiff);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    pub fn png(&self) -> Vec<u8> {
        png_with_chunks(&[(*b"eXIf", self.tiff())])
    }

    pub fn webp(&self) -> Vec<u8> {
        webp_with_chunks(&[(*b"EXIF", self.tiff())])
    }
}

/// 1x1 グレースケールの IHDR
fn ihdr() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(&[8, 0, 0, 0, 0]);
    data
}

/// IHDR + 指定チャンク + IDAT + IEND
pub fn png_with_chunks(chunks: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    let mut all = vec![(*b"IHDR", ihdr())];
    all.extend(chunks.iter().cloned());
    // zlib で圧縮した1行分（フィルタ 0 + 画素 0）
    all.push((*b"IDAT", vec![0x78, 0x9c, 0x63, 0x60, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01]));
    all.push((*b"IEND", Vec::new()));

    for (kind, data) in all {
        png.extend_from_slice(&(data.len() as u32).to_be_bytes());
        png.extend_from_slice(&kind);
        png.extend_from_slice(&data);
        let crc = crc32(kind.iter().chain(data.iter()).copied());
        png.extend_from_slice(&crc.to_be_bytes());
    }
    png
}

/// RIFF/WEBP コンテナ。VP8L 相当のダミーチャンクの後に指定チャンクを並べる
pub fn webp_with_chunks(chunks: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut body = b"WEBP".to_vec();
    let mut all = vec![(*b"VP8L", vec![0x2f, 0, 0, 0, 0])];
    all.extend(chunks.iter().cloned());

    for (kind, data) in all {
        body.extend_from_slice(&kind);
        body.extend_from_slice(&(data.len() as u32).to_le_bytes());
        body.extend_from_slice(&data);
        if data.len() % 2 == 1 {
            body.push(0);
        }
    }

    let mut webp = b"RIFF".to_vec();
    webp.extend_from_slice(&(body.len() as u32).to_le_bytes());
    webp.extend(body);
    webp
}

fn crc32(bytes: impl Iterator<Item = u8>) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for byte in bytes {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

/// IFD本体（エントリ + 次IFDオフセット）と、その直後に続く値データ領域
fn encode_ifd(entries: &[(u16, Val)], start: u32) -> Vec<u8> {
    let data_start = start + 2 + 12 * entries.len() as u32 + 4;
    let mut out = Vec::new();
    let mut data: Vec<u8> = Vec::new();

    out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    for (tag, val) in entries {
        let (typ, count, mut bytes) = val.encode();
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(&typ.to_be_bytes());
        out.extend_from_slice(&count.to_be_bytes());
        if bytes.len() <= 4 {
            bytes.resize(4, 0);
            out.extend(bytes);
        } else {
            let offset = data_start + data.len() as u32;
            out.extend_from_slice(&offset.to_be_bytes());
            data.extend(bytes);
            if data.len() % 2 == 1 {
                data.push(0);
            }
        }
    }
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend(data);
    out
}

/// 48°51'29.6"N, 2°17'40.2"E
pub fn eiffel_tower() -> ExifFixture {
    ExifFixture::new()
        .latitude([(48, 1), (51, 1), (296, 10)], "N")
        .longitude([(2, 1), (17, 1), (402, 10)], "E")
        .date_time("2024:05:01 09:30:00")
}

/// 33°51'24.4"S, 151°12'55.3"E
pub fn sydney_opera_house() -> ExifFixture {
    ExifFixture::new()
        .latitude([(33, 1), (51, 1), (244, 10)], "S")
        .longitude([(151, 1), (12, 1), (553, 10)], "E")
}

pub fn without_gps() -> ExifFixture {
    ExifFixture::new().date_time("2023:12:24 18:00:00")
}
