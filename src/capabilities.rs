//! WMS GetCapabilities client and layer extraction.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content type a WMS 1.1.1 server declares on its capabilities document.
pub const CAPABILITIES_CONTENT_TYPE: &str = "application/vnd.ogc.wms_xml";

/// A projected or geographic bounding box.
///
/// For projected SRS (EPSG:3857 and friends) coordinates are in meters,
/// which is what the resolution math in the sampler assumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Width in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if `other` lies fully within this bbox.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }
}

/// One advertised map layer. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub srs: String,
    pub bbox: BoundingBox,
}

impl Layer {
    /// Build a layer descriptor, rejecting degenerate extents.
    pub fn new(name: String, srs: String, bbox: BoundingBox) -> Result<Self, CapabilitiesError> {
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Err(CapabilitiesError::DegenerateBbox(name));
        }
        Ok(Self { name, srs, bbox })
    }
}

#[derive(Debug, Error)]
pub enum CapabilitiesError {
    #[error("unexpected capabilities content type '{0}', expected '{CAPABILITIES_CONTENT_TYPE}'")]
    UnexpectedContentType(String),

    #[error("capabilities document advertises no layers")]
    NoLayers,

    #[error("layer without a Name element in capabilities document")]
    MissingName,

    #[error("layer '{0}' has no BoundingBox element")]
    MissingBoundingBox(String),

    #[error("layer '{layer}': BoundingBox attribute '{attr}' is not a number: '{value}'")]
    InvalidAttribute {
        layer: String,
        attr: String,
        value: String,
    },

    #[error("layer '{layer}': BoundingBox is missing required attribute '{attr}'")]
    MissingAttribute { layer: String, attr: String },

    #[error("layer '{0}' has a degenerate bounding box, width and height must be positive")]
    DegenerateBbox(String),

    #[error("malformed capabilities XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Fetch GetCapabilities and extract the advertised layers.
///
/// Both failure modes here are fatal for a load session: a capabilities
/// document with the wrong content type, or one advertising no layers.
pub async fn fetch_layers(
    client: &reqwest::Client,
    base_url: &str,
) -> anyhow::Result<Vec<Layer>> {
    let url = format!(
        "{}/wms?service=wms&version=1.1.1&request=GetCapabilities",
        base_url
    );

    let response = client.get(&url).send().await?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if content_type != CAPABILITIES_CONTENT_TYPE {
        return Err(CapabilitiesError::UnexpectedContentType(content_type).into());
    }

    let xml = response.text().await?;
    let layers = parse_layers(&xml)?;
    Ok(layers)
}

/// Parse `Capability/Layer/Layer` elements from a capabilities document.
///
/// WMS 1.1.1 nests concrete layers one level below the root layer, so only
/// depth-2 `Layer` elements inside `Capability` are extracted.
pub fn parse_layers(xml: &str) -> Result<Vec<Layer>, CapabilitiesError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut layers = Vec::new();

    let mut in_capability = false;
    let mut layer_depth = 0usize;
    let mut in_name = false;
    let mut name: Option<String> = None;
    let mut bbox: Option<(BoundingBox, String)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"Capability" => in_capability = true,
                b"Layer" if in_capability => {
                    layer_depth += 1;
                    if layer_depth == 2 {
                        name = None;
                        bbox = None;
                    }
                }
                // First Name/BoundingBox wins: a layer's own children come
                // before any nested Style names or alternate-SRS boxes.
                b"Name" if layer_depth == 2 && name.is_none() => in_name = true,
                b"BoundingBox" if layer_depth == 2 && bbox.is_none() => {
                    bbox = Some(parse_bbox_attrs(&e, name.as_deref())?);
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                // BoundingBox is normally a self-closing element
                if e.name().as_ref() == b"BoundingBox" && layer_depth == 2 && bbox.is_none() {
                    bbox = Some(parse_bbox_attrs(&e, name.as_deref())?);
                }
            }
            Ok(Event::Text(t)) if in_name => {
                name = Some(t.unescape()?.into_owned());
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"Capability" => in_capability = false,
                b"Name" => in_name = false,
                b"Layer" if in_capability => {
                    if layer_depth == 2 {
                        let name = name.take().ok_or(CapabilitiesError::MissingName)?;
                        let (bbox, srs) = bbox
                            .take()
                            .ok_or_else(|| CapabilitiesError::MissingBoundingBox(name.clone()))?;
                        layers.push(Layer::new(name, srs, bbox)?);
                    }
                    layer_depth = layer_depth.saturating_sub(1);
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(CapabilitiesError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    if layers.is_empty() {
        return Err(CapabilitiesError::NoLayers);
    }

    Ok(layers)
}

/// Pull `minx, miny, maxx, maxy, SRS` off a BoundingBox element.
fn parse_bbox_attrs(
    e: &quick_xml::events::BytesStart<'_>,
    layer_name: Option<&str>,
) -> Result<(BoundingBox, String), CapabilitiesError> {
    let layer = layer_name.unwrap_or("<unnamed>").to_string();

    let mut min_x = None;
    let mut min_y = None;
    let mut max_x = None;
    let mut max_y = None;
    let mut srs = None;

    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        match attr.key.as_ref() {
            b"minx" => min_x = Some(parse_coord(&layer, "minx", &value)?),
            b"miny" => min_y = Some(parse_coord(&layer, "miny", &value)?),
            b"maxx" => max_x = Some(parse_coord(&layer, "maxx", &value)?),
            b"maxy" => max_y = Some(parse_coord(&layer, "maxy", &value)?),
            b"SRS" => srs = Some(value),
            _ => {}
        }
    }

    let require = |v: Option<f64>, attr: &str| {
        v.ok_or_else(|| CapabilitiesError::MissingAttribute {
            layer: layer.clone(),
            attr: attr.to_string(),
        })
    };

    let bbox = BoundingBox::new(
        require(min_x, "minx")?,
        require(min_y, "miny")?,
        require(max_x, "maxx")?,
        require(max_y, "maxy")?,
    );
    let srs = srs.ok_or_else(|| CapabilitiesError::MissingAttribute {
        layer: layer.clone(),
        attr: "SRS".to_string(),
    })?;

    Ok((bbox, srs))
}

fn parse_coord(layer: &str, attr: &str, value: &str) -> Result<f64, CapabilitiesError> {
    value
        .parse()
        .map_err(|_| CapabilitiesError::InvalidAttribute {
            layer: layer.to_string(),
            attr: attr.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPABILITIES_XML: &str = r#"
<WMT_MS_Capabilities version="1.1.1">
  <Service>
    <Name>OGC:WMS</Name>
  </Service>
  <Capability>
    <Layer>
      <Title>Root</Title>
      <Layer>
        <Name>hel:Karttasarja</Name>
        <Title>Karttasarja</Title>
        <BoundingBox SRS="EPSG:3879" minx="25485000.0" miny="6665000.0" maxx="25513000.0" maxy="6687000.0"/>
      </Layer>
      <Layer>
        <Name>hel:Opaskartta</Name>
        <Title>Opaskartta &amp; friends</Title>
        <BoundingBox SRS="EPSG:3879" minx="25490000.0" miny="6670000.0" maxx="25510000.0" maxy="6685000.0"/>
      </Layer>
    </Layer>
  </Capability>
</WMT_MS_Capabilities>
"#;

    #[test]
    fn test_parse_layers() {
        let layers = parse_layers(CAPABILITIES_XML).unwrap();
        assert_eq!(layers.len(), 2);

        assert_eq!(layers[0].name, "hel:Karttasarja");
        assert_eq!(layers[0].srs, "EPSG:3879");
        assert_eq!(layers[0].bbox.min_x, 25485000.0);
        assert_eq!(layers[0].bbox.max_y, 6687000.0);
        assert_eq!(layers[0].bbox.width(), 28000.0);
        assert_eq!(layers[0].bbox.height(), 22000.0);

        assert_eq!(layers[1].name, "hel:Opaskartta");
    }

    #[test]
    fn test_no_layers_is_an_error() {
        let xml = r#"
<WMT_MS_Capabilities version="1.1.1">
  <Capability>
    <Layer><Title>Root only</Title></Layer>
  </Capability>
</WMT_MS_Capabilities>
"#;
        let err = parse_layers(xml).unwrap_err();
        assert!(matches!(err, CapabilitiesError::NoLayers));
    }

    #[test]
    fn test_missing_bounding_box() {
        let xml = r#"
<WMT_MS_Capabilities>
  <Capability>
    <Layer>
      <Layer><Name>bare</Name></Layer>
    </Layer>
  </Capability>
</WMT_MS_Capabilities>
"#;
        let err = parse_layers(xml).unwrap_err();
        assert!(matches!(err, CapabilitiesError::MissingBoundingBox(name) if name == "bare"));
    }

    #[test]
    fn test_degenerate_bbox_rejected() {
        let xml = r#"
<WMT_MS_Capabilities>
  <Capability>
    <Layer>
      <Layer>
        <Name>flat</Name>
        <BoundingBox SRS="EPSG:3857" minx="0" miny="5" maxx="100" maxy="5"/>
      </Layer>
    </Layer>
  </Capability>
</WMT_MS_Capabilities>
"#;
        let err = parse_layers(xml).unwrap_err();
        assert!(matches!(err, CapabilitiesError::DegenerateBbox(name) if name == "flat"));
    }

    #[test]
    fn test_layers_outside_capability_ignored() {
        // Only Capability/Layer/Layer counts; a stray top-level Layer does not
        let xml = r#"
<WMT_MS_Capabilities>
  <Layer><Name>stray</Name></Layer>
  <Capability>
    <Layer>
      <Layer>
        <Name>real</Name>
        <BoundingBox SRS="EPSG:3857" minx="0" miny="0" maxx="10" maxy="10"/>
      </Layer>
    </Layer>
  </Capability>
</WMT_MS_Capabilities>
"#;
        let layers = parse_layers(xml).unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].name, "real");
    }

    #[test]
    fn test_bbox_contains() {
        let outer = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        assert!(outer.contains(&BoundingBox::new(10.0, 10.0, 20.0, 20.0)));
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&BoundingBox::new(90.0, 90.0, 110.0, 110.0)));
    }
}
