use crate::core::geometry::{
    BurstTable, GeoLocationGrid, GeoLocationPoint, ProductDescriptor, SubSwathGeometry, SubSwathParams,
};
use crate::types::{utc_to_mjd2000, SarError, SarResult, SECONDS_IN_DAY};
use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;

/// Root `<product>` element of a Sentinel-1 sub-swath annotation
#[derive(Debug, Deserialize)]
pub struct AnnotationRoot {
    #[serde(rename = "adsHeader")]
    pub ads_header: AdsHeader,
    #[serde(rename = "imageAnnotation")]
    pub image_annotation: ImageAnnotation,
    #[serde(rename = "swathTiming")]
    pub swath_timing: SwathTiming,
    #[serde(rename = "geolocationGrid")]
    pub geolocation_grid: GeolocationGridXml,
}

#[derive(Debug, Deserialize)]
pub struct AdsHeader {
    #[serde(rename = "missionId")]
    pub mission_id: String,
    #[serde(rename = "productType")]
    pub product_type: String,
    #[serde(rename = "polarisation")]
    pub polarisation: String,
    #[serde(rename = "mode")]
    pub mode: String,
    #[serde(rename = "swath")]
    pub swath: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageAnnotation {
    #[serde(rename = "imageInformation")]
    pub image_information: ImageInformation,
}

#[derive(Debug, Deserialize)]
pub struct ImageInformation {
    #[serde(rename = "productFirstLineUtcTime")]
    pub product_first_line_utc_time: String,
    #[serde(rename = "productLastLineUtcTime")]
    pub product_last_line_utc_time: String,
    /// Seconds
    #[serde(rename = "azimuthTimeInterval")]
    pub azimuth_time_interval: f64,
    #[serde(rename = "rangePixelSpacing")]
    pub range_pixel_spacing: f64,
    /// Two-way slant range time to the first sample (s)
    #[serde(rename = "slantRangeTime")]
    pub slant_range_time: f64,
    #[serde(rename = "numberOfSamples")]
    pub number_of_samples: usize,
    #[serde(rename = "numberOfLines")]
    pub number_of_lines: usize,
}

#[derive(Debug, Deserialize)]
pub struct SwathTiming {
    #[serde(rename = "linesPerBurst")]
    pub lines_per_burst: usize,
    #[serde(rename = "samplesPerBurst")]
    pub samples_per_burst: usize,
    #[serde(rename = "burstList")]
    pub burst_list: BurstList,
}

#[derive(Debug, Deserialize)]
pub struct BurstList {
    #[serde(rename = "@count", default)]
    pub count: usize,
    #[serde(rename = "burst", default)]
    pub bursts: Vec<Burst>,
}

#[derive(Debug, Deserialize)]
pub struct Burst {
    #[serde(rename = "azimuthTime")]
    pub azimuth_time: String,
    #[serde(rename = "firstValidSample")]
    pub first_valid_sample: Option<ValueList>,
    #[serde(rename = "lastValidSample")]
    pub last_valid_sample: Option<ValueList>,
}

/// Whitespace separated values with a `count` attribute
#[derive(Debug, Deserialize)]
pub struct ValueList {
    #[serde(rename = "@count", default)]
    pub count: usize,
    #[serde(rename = "$text", default)]
    pub text: String,
}

impl ValueList {
    pub fn parse<T: std::str::FromStr>(&self, what: &str) -> SarResult<Vec<T>> {
        self.text
            .split_whitespace()
            .map(|v| {
                v.parse::<T>()
                    .map_err(|_| SarError::Metadata(format!("Invalid {} value '{}'", what, v)))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct GeolocationGridXml {
    #[serde(rename = "geolocationGridPointList")]
    pub geolocation_grid_point_list: GeolocationGridPointList,
}

#[derive(Debug, Deserialize)]
pub struct GeolocationGridPointList {
    #[serde(rename = "geolocationGridPoint", default)]
    pub points: Vec<GeolocationGridPoint>,
}

#[derive(Debug, Deserialize)]
pub struct GeolocationGridPoint {
    #[serde(rename = "azimuthTime")]
    pub azimuth_time: String,
    /// Two-way (s)
    #[serde(rename = "slantRangeTime")]
    pub slant_range_time: f64,
    #[serde(rename = "line")]
    pub line: i64,
    #[serde(rename = "pixel")]
    pub pixel: i64,
    #[serde(rename = "latitude")]
    pub latitude: f64,
    #[serde(rename = "longitude")]
    pub longitude: f64,
    #[serde(rename = "incidenceAngle")]
    pub incidence_angle: f64,
}

/// Parse a Sentinel-1 annotation timestamp (UTC, no zone suffix)
pub fn parse_utc_time(value: &str) -> SarResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%M:%S%.f")
        .map(|t| t.and_utc())
        .map_err(|e| SarError::Metadata(format!("Invalid UTC time '{}': {}", value, e)))
}

/// Annotation UTC timestamp as fractional days since 2000-01-01
pub fn parse_mjd2000(value: &str) -> SarResult<f64> {
    parse_utc_time(value).map(|t| utc_to_mjd2000(&t))
}

/// Long mission name for an annotation mission id (`S1A` -> `SENTINEL-1A`)
pub fn mission_name(mission_id: &str) -> String {
    let id = mission_id.trim().to_uppercase();
    match id.strip_prefix("S1") {
        Some(unit) => format!("SENTINEL-1{}", unit),
        None => id,
    }
}

/// Parser for Sentinel-1 annotation XML files
pub struct AnnotationParser;

impl AnnotationParser {
    /// Parse complete annotation XML
    pub fn parse_annotation(xml_content: &str) -> SarResult<AnnotationRoot> {
        from_str::<AnnotationRoot>(xml_content)
            .map_err(|e| SarError::XmlParsing(format!("Failed to parse annotation XML: {}", e)))
    }

    /// Mission, product type and acquisition mode for product validation
    pub fn product_descriptor(annotation: &AnnotationRoot) -> ProductDescriptor {
        let header = &annotation.ads_header;
        ProductDescriptor {
            mission: mission_name(&header.mission_id),
            product_type: header.product_type.trim().to_string(),
            acquisition_mode: header.mode.trim().to_string(),
        }
    }

    /// Build the geometry table of one sub-swath; `index` is its position in range order
    pub fn subswath_geometry(annotation: &AnnotationRoot, index: usize) -> SarResult<SubSwathGeometry> {
        let info = &annotation.image_annotation.image_information;
        let name = annotation.ads_header.swath.trim().to_uppercase();
        let azimuth_time_interval = info.azimuth_time_interval / SECONDS_IN_DAY;

        let params = SubSwathParams {
            name: name.clone(),
            index,
            num_lines: info.number_of_lines,
            num_samples: info.number_of_samples,
            first_line_time: parse_mjd2000(&info.product_first_line_utc_time)?,
            last_line_time: parse_mjd2000(&info.product_last_line_utc_time)?,
            azimuth_time_interval,
            slant_range_time_to_first_pixel: info.slant_range_time / 2.0,
            range_pixel_spacing: info.range_pixel_spacing,
        };

        let bursts = Self::burst_table(&annotation.swath_timing, azimuth_time_interval)?;
        let geo_grid = Self::geolocation_grid(&annotation.geolocation_grid)?;

        log::debug!(
            "{}: {} lines x {} samples, {} bursts of {} lines, {}x{} geolocation points",
            name,
            info.number_of_lines,
            info.number_of_samples,
            bursts.len(),
            bursts.lines_per_burst,
            geo_grid.num_lines(),
            geo_grid.points_per_line()
        );

        SubSwathGeometry::new(params, bursts, geo_grid)
    }

    /// Burst first line times plus valid sample bounds
    pub fn burst_table(timing: &SwathTiming, azimuth_time_interval: f64) -> SarResult<BurstTable> {
        let bursts = &timing.burst_list.bursts;
        if bursts.is_empty() {
            return Err(SarError::Metadata("Annotation lists no bursts".to_string()));
        }

        let first_line_times = bursts
            .iter()
            .map(|b| parse_mjd2000(&b.azimuth_time))
            .collect::<SarResult<Vec<f64>>>()?;
        let table = BurstTable::new(
            timing.lines_per_burst,
            timing.samples_per_burst,
            first_line_times,
            azimuth_time_interval,
        );

        if bursts.iter().any(|b| b.first_valid_sample.is_none() || b.last_valid_sample.is_none()) {
            return Ok(table);
        }
        let mut first_valid = Vec::with_capacity(bursts.len());
        let mut last_valid = Vec::with_capacity(bursts.len());
        for burst in bursts {
            if let (Some(first), Some(last)) = (&burst.first_valid_sample, &burst.last_valid_sample) {
                first_valid.push(first.parse::<i32>("firstValidSample")?);
                last_valid.push(last.parse::<i32>("lastValidSample")?);
            }
        }
        table.with_valid_samples(first_valid, last_valid)
    }

    /// Geolocation grid with one-way slant range times; the points per grid line are
    /// counted from the points sharing the first point's line
    pub fn geolocation_grid(grid: &GeolocationGridXml) -> SarResult<GeoLocationGrid> {
        let points = &grid.geolocation_grid_point_list.points;
        let first_line = points
            .first()
            .map(|p| p.line)
            .ok_or_else(|| SarError::Metadata("Annotation has no geolocation grid points".to_string()))?;
        let points_per_line = points.iter().take_while(|p| p.line == first_line).count();

        let converted = points
            .iter()
            .map(|p| {
                Ok(GeoLocationPoint {
                    azimuth_time: parse_mjd2000(&p.azimuth_time)?,
                    slant_range_time: p.slant_range_time / 2.0,
                    latitude: p.latitude,
                    longitude: p.longitude,
                    incidence_angle: p.incidence_angle,
                })
            })
            .collect::<SarResult<Vec<_>>>()?;

        GeoLocationGrid::from_points(&converted, points_per_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::GeoField;
    use crate::types::SPEED_OF_LIGHT;
    use approx::assert_relative_eq;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<product>
  <adsHeader>
    <missionId>S1A</missionId>
    <productType>SLC</productType>
    <polarisation>VV</polarisation>
    <mode>IW</mode>
    <swath>IW2</swath>
    <startTime>2020-01-03T17:08:15.000000</startTime>
  </adsHeader>
  <imageAnnotation>
    <imageInformation>
      <productFirstLineUtcTime>2020-01-03T17:08:15.000000</productFirstLineUtcTime>
      <productLastLineUtcTime>2020-01-03T17:08:15.390000</productLastLineUtcTime>
      <azimuthTimeInterval>2.000000e-03</azimuthTimeInterval>
      <rangePixelSpacing>2.329562e+00</rangePixelSpacing>
      <slantRangeTime>1.000000e-02</slantRangeTime>
      <numberOfSamples>400</numberOfSamples>
      <numberOfLines>200</numberOfLines>
    </imageInformation>
  </imageAnnotation>
  <swathTiming>
    <linesPerBurst>100</linesPerBurst>
    <samplesPerBurst>400</samplesPerBurst>
    <burstList count="2">
      <burst>
        <azimuthTime>2020-01-03T17:08:15.000000</azimuthTime>
        <firstValidSample count="3">-1 5 5</firstValidSample>
        <lastValidSample count="3">-1 390 390</lastValidSample>
      </burst>
      <burst>
        <azimuthTime>2020-01-03T17:08:15.180000</azimuthTime>
        <firstValidSample count="3">4 4 -1</firstValidSample>
        <lastValidSample count="3">391 391 -1</lastValidSample>
      </burst>
    </burstList>
  </swathTiming>
  <geolocationGrid>
    <geolocationGridPointList count="4">
      <geolocationGridPoint>
        <azimuthTime>2020-01-03T17:08:14.990000</azimuthTime>
        <slantRangeTime>9.990000e-03</slantRangeTime>
        <line>0</line><pixel>0</pixel>
        <latitude>45.0</latitude><longitude>7.0</longitude><height>0</height>
        <incidenceAngle>32.0</incidenceAngle>
      </geolocationGridPoint>
      <geolocationGridPoint>
        <azimuthTime>2020-01-03T17:08:14.990000</azimuthTime>
        <slantRangeTime>1.001000e-02</slantRangeTime>
        <line>0</line><pixel>399</pixel>
        <latitude>45.1</latitude><longitude>8.0</longitude><height>0</height>
        <incidenceAngle>36.0</incidenceAngle>
      </geolocationGridPoint>
      <geolocationGridPoint>
        <azimuthTime>2020-01-03T17:08:15.410000</azimuthTime>
        <slantRangeTime>9.990000e-03</slantRangeTime>
        <line>199</line><pixel>0</pixel>
        <latitude>44.0</latitude><longitude>6.8</longitude><height>0</height>
        <incidenceAngle>32.0</incidenceAngle>
      </geolocationGridPoint>
      <geolocationGridPoint>
        <azimuthTime>2020-01-03T17:08:15.410000</azimuthTime>
        <slantRangeTime>1.001000e-02</slantRangeTime>
        <line>199</line><pixel>399</pixel>
        <latitude>44.1</latitude><longitude>7.8</longitude><height>0</height>
        <incidenceAngle>36.0</incidenceAngle>
      </geolocationGridPoint>
    </geolocationGridPointList>
  </geolocationGrid>
</product>"#;

    #[test]
    fn test_annotation_parsing() {
        let root = AnnotationParser::parse_annotation(SAMPLE_XML).unwrap();
        assert_eq!(root.swath_timing.burst_list.count, 2);
        let descriptor = AnnotationParser::product_descriptor(&root);
        assert_eq!(descriptor.mission, "SENTINEL-1A");
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_subswath_geometry_from_annotation() {
        let root = AnnotationParser::parse_annotation(SAMPLE_XML).unwrap();
        let sw = AnnotationParser::subswath_geometry(&root, 1).unwrap();

        assert_eq!(sw.name, "IW2");
        assert_eq!(sw.index, 1);
        assert_relative_eq!(sw.azimuth_time_interval * SECONDS_IN_DAY, 2.0e-3, max_relative = 1e-12);
        assert_relative_eq!(sw.slant_range_time_to_first_pixel, 5.0e-3, max_relative = 1e-12);
        assert_relative_eq!(
            sw.slant_range_time_to_last_pixel,
            5.0e-3 + 399.0 * 2.329562 / SPEED_OF_LIGHT,
            max_relative = 1e-12
        );

        assert_eq!(sw.bursts.len(), 2);
        let burst_gap = (sw.bursts.first_line_time(1) - sw.bursts.first_line_time(0)) * SECONDS_IN_DAY;
        assert_relative_eq!(burst_gap, 0.18, epsilon = 1e-6);
        assert_eq!(sw.bursts.valid_samples(0, 0), None);
        assert_eq!(sw.bursts.valid_samples(1, 1), Some((4, 391)));

        assert_eq!(sw.geo_grid.points_per_line(), 2);
        assert_eq!(sw.geo_grid.num_lines(), 2);
        assert_relative_eq!(sw.geo_grid.field(GeoField::SlantRangeTime)[[0, 1]], 5.005e-3, max_relative = 1e-12);
    }

    #[test]
    fn test_invalid_time_rejected() {
        assert!(matches!(parse_utc_time("03/01/2020 17:08"), Err(SarError::Metadata(_))));
    }

    #[test]
    fn test_mission_name() {
        assert_eq!(mission_name("S1B"), "SENTINEL-1B");
        assert_eq!(mission_name("ENVISAT"), "ENVISAT");
    }
}
