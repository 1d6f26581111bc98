use anyhow::{Context, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::model::{Coordinates, PhotoRecord};

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

const DEFAULT_DOCUMENT_NAME: &str = "Photo Locations";
const PREVIEW_WIDTH: u32 = 300;

/// Builds a KML document with one placemark per located photo.
pub struct KmlWriter {
    base_url: String,
    document_name: String,
}

impl KmlWriter {
    /// `base_url` is the URL or path under which stored photos are reachable.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            document_name: DEFAULT_DOCUMENT_NAME.to_string(),
        }
    }

    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = name.into();
        self
    }

    pub fn photo_url(&self, stored_name: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.is_empty() {
            stored_name.to_string()
        } else {
            format!("{}/{}", base, stored_name)
        }
    }

    /// Records without coordinates are skipped.
    pub fn to_kml_string(&self, records: &[PhotoRecord]) -> Result<String> {
        let located: Vec<(&PhotoRecord, &Coordinates)> = records
            .iter()
            .filter_map(|r| r.coordinates.as_ref().map(|c| (r, c)))
            .collect();

        tracing::debug!(
            "Assembling KML: {} placemarks ({} records skipped without location)",
            located.len(),
            records.len() - located.len()
        );

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .context("Failed to write XML declaration")?;
        writer
            .write_event(Event::Start(
                BytesStart::new("kml").with_attributes([("xmlns", KML_NAMESPACE)]),
            ))
            .context("Failed to open kml element")?;
        writer
            .write_event(Event::Start(BytesStart::new("Document")))
            .context("Failed to open Document element")?;

        write_text_element(&mut writer, "name", &self.document_name)?;
        let description = format!("GPS locations extracted from {} photos", located.len());
        write_text_element(&mut writer, "description", &description)?;

        for (record, coordinates) in located {
            self.write_placemark(&mut writer, record, coordinates)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("Document")))
            .context("Failed to close Document element")?;
        writer
            .write_event(Event::End(BytesEnd::new("kml")))
            .context("Failed to close kml element")?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).context("Generated KML is not valid UTF-8")
    }

    fn write_placemark(
        &self,
        writer: &mut Writer<Vec<u8>>,
        record: &PhotoRecord,
        coordinates: &Coordinates,
    ) -> Result<()> {
        writer
            .write_event(Event::Start(BytesStart::new("Placemark")))
            .context("Failed to open Placemark element")?;

        write_text_element(writer, "name", &record.original_filename)?;

        // KMLスキーマの要素順: name, description, TimeStamp, Point
        let html = self.description_html(record, coordinates);
        writer
            .create_element("description")
            .write_cdata_content(BytesCData::new(html.as_str()))
            .context("Failed to write placemark description")?;

        if let Some(captured_at) = &record.captured_at {
            writer
                .write_event(Event::Start(BytesStart::new("TimeStamp")))
                .context("Failed to open TimeStamp element")?;
            write_text_element(writer, "when", captured_at)?;
            writer
                .write_event(Event::End(BytesEnd::new("TimeStamp")))
                .context("Failed to close TimeStamp element")?;
        }

        writer
            .write_event(Event::Start(BytesStart::new("Point")))
            .context("Failed to open Point element")?;
        if coordinates.altitude().is_some() {
            write_text_element(writer, "altitudeMode", "absolute")?;
        }
        write_text_element(writer, "coordinates", &coordinates.to_kml_tuple())?;
        writer
            .write_event(Event::End(BytesEnd::new("Point")))
            .context("Failed to close Point element")?;

        writer
            .write_event(Event::End(BytesEnd::new("Placemark")))
            .context("Failed to close Placemark element")?;

        Ok(())
    }

    // 埋め込む値はすべてエスケープ済みなので CDATA の終端は現れない
    fn description_html(&self, record: &PhotoRecord, coordinates: &Coordinates) -> String {
        let url = self.photo_url(&record.stored_name);
        let url = escape(url.as_str());
        let name = escape(record.original_filename.as_str());
        let captured = record
            .captured_at
            .as_deref()
            .map(escape)
            .unwrap_or("Unknown".into());

        let mut html = format!(
            "<h3>{}</h3><p>Captured: {}</p><p>Coordinates: {:.6}, {:.6}</p>",
            name,
            captured,
            coordinates.latitude(),
            coordinates.longitude()
        );
        if let Some(altitude) = coordinates.altitude() {
            html.push_str(&format!("<p>Altitude: {:.2}m</p>", altitude));
        }
        html.push_str(&format!(
            "<img src=\"{url}\" width=\"{PREVIEW_WIDTH}\" alt=\"Photo\"/><br/>\
             <a href=\"{url}\" target=\"_blank\">View Full Size</a>"
        ));
        html
    }
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))
        .with_context(|| format!("Failed to write {} element", tag))?;
    Ok(())
}
