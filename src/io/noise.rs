use crate::core::geometry::NoiseVector;
use crate::io::annotation::{parse_mjd2000, ValueList};
use crate::types::{SarError, SarResult};
use quick_xml::de::from_str;
use serde::Deserialize;

/// Root `<noise>` element of a Sentinel-1 noise annotation.
///
/// Products before IPF 2.9 carry `noiseVectorList`, later ones `noiseRangeVectorList`.
#[derive(Debug, Deserialize)]
pub struct NoiseRoot {
    #[serde(rename = "noiseVectorList")]
    pub noise_vector_list: Option<NoiseVectorList>,
    #[serde(rename = "noiseRangeVectorList")]
    pub noise_range_vector_list: Option<NoiseRangeVectorList>,
}

#[derive(Debug, Deserialize)]
pub struct NoiseVectorList {
    #[serde(rename = "noiseVector", default)]
    pub vectors: Vec<NoiseVectorXml>,
}

#[derive(Debug, Deserialize)]
pub struct NoiseRangeVectorList {
    #[serde(rename = "noiseRangeVector", default)]
    pub vectors: Vec<NoiseVectorXml>,
}

#[derive(Debug, Deserialize)]
pub struct NoiseVectorXml {
    #[serde(rename = "azimuthTime")]
    pub azimuth_time: String,
    #[serde(rename = "line")]
    pub line: i64,
    #[serde(rename = "pixel")]
    pub pixel: ValueList,
    #[serde(rename = "noiseLut")]
    pub noise_lut: Option<ValueList>,
    #[serde(rename = "noiseRangeLut")]
    pub noise_range_lut: Option<ValueList>,
}

/// Parser for Sentinel-1 noise XML files
pub struct NoiseParser;

impl NoiseParser {
    pub fn parse_noise(xml_content: &str) -> SarResult<NoiseRoot> {
        from_str::<NoiseRoot>(xml_content)
            .map_err(|e| SarError::XmlParsing(format!("Failed to parse noise XML: {}", e)))
    }

    /// Range noise vectors ordered by line
    pub fn noise_vectors(root: &NoiseRoot) -> SarResult<Vec<NoiseVector>> {
        let raw = root
            .noise_range_vector_list
            .as_ref()
            .map(|l| &l.vectors)
            .or_else(|| root.noise_vector_list.as_ref().map(|l| &l.vectors))
            .ok_or_else(|| SarError::Metadata("Noise annotation has no range noise vectors".to_string()))?;

        let mut vectors = raw
            .iter()
            .map(|v| {
                let lut = v
                    .noise_range_lut
                    .as_ref()
                    .or(v.noise_lut.as_ref())
                    .ok_or_else(|| SarError::Metadata(format!("Noise vector at line {} has no LUT", v.line)))?;
                let pixels = v.pixel.parse::<i64>("noise pixel")?;
                let values = lut.parse::<f32>("noise LUT")?;
                if pixels.is_empty() || pixels.len() != values.len() {
                    return Err(SarError::Metadata(format!(
                        "Noise vector at line {} has {} pixels but {} values",
                        v.line,
                        pixels.len(),
                        values.len()
                    )));
                }
                Ok(NoiseVector {
                    time: parse_mjd2000(&v.azimuth_time)?,
                    line: v.line,
                    pixels,
                    values,
                })
            })
            .collect::<SarResult<Vec<_>>>()?;

        if vectors.is_empty() {
            return Err(SarError::Metadata("Noise annotation lists no vectors".to_string()));
        }
        vectors.sort_by_key(|v| v.line);
        Ok(vectors)
    }

    /// Parse noise XML straight to vectors
    pub fn read_noise_vectors(xml_content: &str) -> SarResult<Vec<NoiseVector>> {
        Self::noise_vectors(&Self::parse_noise(xml_content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_vector_list() {
        let xml = r#"<noise>
  <noiseRangeVectorList count="2">
    <noiseRangeVector>
      <azimuthTime>2020-01-03T17:08:15.500000</azimuthTime>
      <line>100</line>
      <pixel count="3">0 100 399</pixel>
      <noiseRangeLut count="3">1.5e+02 1.6e+02 1.7e+02</noiseRangeLut>
    </noiseRangeVector>
    <noiseRangeVector>
      <azimuthTime>2020-01-03T17:08:15.000000</azimuthTime>
      <line>0</line>
      <pixel count="3">0 100 399</pixel>
      <noiseRangeLut count="3">1.0e+02 1.1e+02 1.2e+02</noiseRangeLut>
    </noiseRangeVector>
  </noiseRangeVectorList>
</noise>"#;
        let vectors = NoiseParser::read_noise_vectors(xml).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].line, 0);
        assert_eq!(vectors[1].pixels, vec![0, 100, 399]);
        assert_eq!(vectors[1].values[2], 170.0);
    }

    #[test]
    fn test_legacy_vector_list() {
        let xml = r#"<noise>
  <noiseVectorList count="1">
    <noiseVector>
      <azimuthTime>2016-05-01T05:30:00.000000</azimuthTime>
      <line>0</line>
      <pixel count="2">0 40</pixel>
      <noiseLut count="2">3.0 4.0</noiseLut>
    </noiseVector>
  </noiseVectorList>
</noise>"#;
        let vectors = NoiseParser::read_noise_vectors(xml).unwrap();
        assert_eq!(vectors[0].values, vec![3.0, 4.0]);
    }

    #[test]
    fn test_mismatched_lut_rejected() {
        let xml = r#"<noise><noiseRangeVectorList count="1"><noiseRangeVector>
      <azimuthTime>2020-01-03T17:08:15.000000</azimuthTime><line>0</line>
      <pixel count="2">0 40</pixel><noiseRangeLut count="1">3.0</noiseRangeLut>
    </noiseRangeVector></noiseRangeVectorList></noise>"#;
        assert!(matches!(NoiseParser::read_noise_vectors(xml), Err(SarError::Metadata(_))));
    }
}
