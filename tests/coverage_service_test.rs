//! End-to-end requests against the in-memory raster backend

use std::fs;
use std::path::Path;
use std::rc::Rc;

use eowcs::config::{DatasetCatalog, ServiceConfig};
use eowcs::coordinate::GeoTransform;
use eowcs::errors::{ExceptionCode, WcsError};
use eowcs::pipeline::{DeliveryMode, OutputTarget};
use eowcs::raster::{GroundControlPoint, MemoryDataset, MemoryRasterIo};
use eowcs::request::ServiceRequest;
use eowcs::{EoWcs, Extraction, SubsetRequest};

const GRID: &str = "HDF4_EOS:EOS_GRID:\"/data/MOD13C1.hdf\":MODIS_Grid_16Day_VI_CMG:CMG_0.05_Deg_16_days_NDVI";
const SWATH: &str = "HDF4_EOS:EOS_SWATH:\"/data/MOD06_L2.hdf\":mod06:Cloud_Top_Temperature";
const TRMM: &str = "TRMM:\"/data/3B42.20100101.7.nc\":Daily";
const NITF: &str = "NITF:\"/data/i_3001a.ntf\":IM1";

const CATALOG: &str = r#"<Datasets>
  <Dataset>
    <name>MOD13C1_NDVI</name>
    <path>/data/MOD13C1.hdf</path>
    <coverageID>HDF4_EOS:EOS_GRID:"/data/MOD13C1.hdf":MODIS_Grid_16Day_VI_CMG:CMG_0.05_Deg_16_days_NDVI</coverageID>
    <beginTime>2010-10-16T00:00:00Z</beginTime>
    <endTime>2010-10-31T23:59:59Z</endTime>
  </Dataset>
</Datasets>"#;

struct Fixture {
    _dir: tempfile::TempDir,
    temp: std::path::PathBuf,
    io: Rc<MemoryRasterIo>,
    service: EoWcs,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let temp = dir.path().join("tmp");
    fs::create_dir(&temp).unwrap();

    let io = Rc::new(MemoryRasterIo::new());
    io.register(
        MemoryDataset::new(GRID, "HDF4Image", 7200, 3600)
            .with_band_count(2)
            .with_projection("EPSG:4326")
            .with_geo_transform(GeoTransform([-180.0, 0.05, 0.0, 90.0, 0.0, -0.05]))
            .with_no_data(1, -3000.0)
            .with_metadata("", "WESTBOUNDINGCOORDINATE", "-180")
            .with_metadata("", "units", "NDVI"),
    );
    io.register(MemoryDataset::new(SWATH, "HDF4Image", 270, 406).with_gcps(
        vec![GroundControlPoint { pixel: 0.0, line: 0.0, x: -80.0, y: 40.0 }],
        None,
    ));
    io.register(MemoryDataset::new("/data/3B42.20100101.7.nc", "netCDF", 1440, 400));
    io.register(
        MemoryDataset::new("/data/i_3001a.ntf", "NITF", 1024, 1024)
            .with_projection("EPSG:4326")
            .with_geo_transform(GeoTransform([85.0, 0.001, 0.0, 33.0, 0.0, -0.001]))
            .with_metadata("", "NITF_FHDR", "NITF02.10"),
    );

    let config = ServiceConfig {
        access_url: "http://localhost/cgi-bin/eowcs".to_string(),
        output_prefix_url: "http://localhost/output/".to_string(),
        temporary_output_directory: temp.clone(),
        ..Default::default()
    };
    let catalog = DatasetCatalog::parse(CATALOG).unwrap();
    let service = EoWcs::with_backends(config, catalog, io.clone(), io.clone(), io.clone());

    Fixture { _dir: dir, temp, io, service }
}

fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

fn get_coverage_request(service: &EoWcs, query: &str) -> SubsetRequest {
    let full = format!("service=WCS&version=2.0.0&request=GetCoverage&{}", query);
    match service.parse_request(&full, false).unwrap() {
        ServiceRequest::GetCoverage(request) => request,
        other => panic!("unexpected request {:?}", other),
    }
}

fn respond(fixture: &Fixture, query: &str) -> (Result<Extraction, WcsError>, String) {
    let request = get_coverage_request(&fixture.service, query);
    let mut out = Vec::new();
    let result = fixture.service.get_coverage(&request, &OutputTarget::Respond, &mut out);
    (result, String::from_utf8_lossy(&out).into_owned())
}

#[test]
fn test_grid_subset_as_geotiff() {
    let fixture = fixture();
    let (result, body) = respond(
        &fixture,
        "coverageid=MOD13C1_NDVI&format=image/tiff&subset=Long(10,20)&subset=Lat(30,40)",
    );
    let extraction = result.unwrap();

    assert_eq!(extraction.delivery, Some(DeliveryMode::Direct));
    assert!(!extraction.retained);
    assert!(body.starts_with("Content-Length: "));
    assert!(body.contains("Content-Type: image/tiff\r\n"));
    assert_eq!(file_count(&fixture.temp), 0);

    let job = fixture.io.resamples().pop().unwrap();
    assert_eq!(job.source, GRID);
    assert_eq!(job.target_srs.as_deref(), Some("EPSG:4326"));
    let extent = job.extent.unwrap();
    assert_eq!((extent.min_x, extent.min_y, extent.max_x, extent.max_y), (10.0, 30.0, 20.0, 40.0));
    assert_eq!(job.no_data, -3000.0);

    let copy = fixture.io.copies().pop().unwrap();
    assert_eq!(copy.driver, "GTiff");
    let item = |key: &str| copy.metadata.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
    assert_eq!(item("WESTBOUNDINGCOORDINATE").as_deref(), Some("10"));
    assert_eq!(item("NORTHBOUNDINGCOORDINATE").as_deref(), Some("40"));
    assert_eq!(item("units").as_deref(), Some("NDVI"));
    let eo = item("EOMetadataContents").unwrap();
    assert!(eo.contains("<gml:beginPosition>2010-10-16T00:00:00Z</gml:beginPosition>"));
}

#[test]
fn test_latitude_first_subset_with_negative_longitudes() {
    let fixture = fixture();
    let (result, body) = respond(
        &fixture,
        "coverageid=MOD13C1_NDVI&format=image/geotiff&subset=Lat(20,30)&subset=Long(-10,10)",
    );
    let extraction = result.unwrap();

    assert_eq!(extraction.delivery, Some(DeliveryMode::Direct));
    assert!(body.contains("Content-Type: image/tiff\r\n"));
    assert_eq!(file_count(&fixture.temp), 0);

    let extent = fixture.io.resamples().pop().unwrap().extent.unwrap();
    assert_eq!((extent.min_x, extent.min_y, extent.max_x, extent.max_y), (-10.0, 20.0, 10.0, 30.0));
    assert_eq!(extraction.plan.bbox, extent);
    assert_eq!((extraction.plan.width, extraction.plan.height), (400, 200));
}

#[test]
fn test_reversed_subset_bounds_are_normalized() {
    let fixture = fixture();
    let (result, _) = respond(
        &fixture,
        "coverageid=MOD13C1_NDVI&format=image/tiff&subset=Long(10,-10)&subset=Lat(30,20)",
    );
    result.unwrap();

    let extent = fixture.io.resamples().pop().unwrap().extent.unwrap();
    assert_eq!((extent.min_x, extent.min_y, extent.max_x, extent.max_y), (-10.0, 20.0, 10.0, 30.0));
}

#[test]
fn test_mixed_subset_crs() {
    let fixture = fixture();
    let request = get_coverage_request(
        &fixture.service,
        "coverageid=MOD13C1_NDVI&format=image/tiff&subset=x(0,1000000,EPSG:3857)&subset=y(2273031,3503550)",
    );
    assert_eq!(request.request_crs.epsg_code(), Some(3857));

    let full = "service=WCS&version=2.0.0&request=GetCoverage&coverageid=MOD13C1_NDVI&format=image/tiff\
                &subset=x(0,1000000,EPSG:3857)&subset=y(20,30,EPSG:4326)";
    let err = fixture.service.parse_request(full, false).err().unwrap();
    assert_eq!(err.code(), ExceptionCode::InvalidParameterValue);
    assert_eq!(err.locator(), "SUBSET");
    assert!(fixture.io.opened().is_empty());
}

#[test]
fn test_unsupported_format_leaves_nothing_behind() {
    let fixture = fixture();
    let (result, body) = respond(&fixture, "coverageid=MOD13C1_NDVI&format=image/bmp");
    let err = result.err().unwrap();

    assert_eq!(err.code(), ExceptionCode::InvalidParameterValue);
    assert_eq!(err.locator(), "FORMAT");
    assert!(body.is_empty());
    assert!(fixture.io.opened().is_empty());
    assert_eq!(file_count(&fixture.temp), 0);
}

#[test]
fn test_output_crs_reprojects_the_subset() {
    let fixture = fixture();
    let (result, _) = respond(
        &fixture,
        "coverageid=MOD13C1_NDVI&format=image/tiff&subset=Long(10,20)&subset=Lat(30,40)&outputcrs=EPSG:3857",
    );
    let extraction = result.unwrap();

    assert_eq!(extraction.plan.crs.epsg_code(), Some(3857));
    let job = fixture.io.resamples().pop().unwrap();
    assert_eq!(job.target_srs.as_deref(), Some("EPSG:3857"));
    let extent = job.extent.unwrap();
    assert!((extent.min_x - 1_113_194.9).abs() < 1.0);
    assert!((extent.max_x - 2_226_389.8).abs() < 1.0);
    assert!(extent.min_y > 3_500_000.0 && extent.max_y < 4_900_000.0);
}

#[test]
fn test_swath_without_geolocation_stays_in_pixel_space() {
    let fixture = fixture();
    let request = SubsetRequest::new(SWATH, "image/tiff");
    let output = fixture.temp.join("swath.tif");
    let extraction = fixture
        .service
        .get_coverage(&request, &OutputTarget::File(output.clone()), &mut Vec::<u8>::new())
        .unwrap();

    assert!(extraction.retained);
    assert!(output.exists());
    assert!(fixture.io.copies().iter().all(|c| c.source != SWATH));
    let job = fixture.io.resamples().pop().unwrap();
    assert_eq!(job.source, SWATH);
    assert_eq!(job.target_srs, None);
    assert_eq!(job.extent, None);
    assert_eq!(extraction.plan.geo_transform, GeoTransform::identity());
    assert_eq!((extraction.plan.width, extraction.plan.height), (270, 406));
}

#[test]
fn test_jpeg2000_embeds_eo_metadata() {
    let fixture = fixture();
    let (result, body) = respond(&fixture, "coverageid=MOD13C1_NDVI&format=image/jp2");
    result.unwrap();

    let job = fixture.io.compressions().pop().unwrap();
    assert_eq!(job.parameters, vec!["ORGgen_plt=yes", "Creversible=yes"]);
    assert!(job.side_file.unwrap().to_string_lossy().ends_with(".jp2.txt"));
    assert!(body.contains("Content-Type: image/jp2\r\n"));
    assert!(body.contains("xml <wcseo:RectifiedDataset"));
    assert!(fixture.io.copies().is_empty());
    assert_eq!(file_count(&fixture.temp), 0);
}

#[test]
fn test_multipart_keeps_the_artifact() {
    let fixture = fixture();
    let (result, body) = respond(
        &fixture,
        "coverageid=MOD13C1_NDVI&format=image/tiff&mediatype=multipart/mixed&subset=Long(10,20)&subset=Lat(30,40)",
    );
    let extraction = result.unwrap();

    assert_eq!(extraction.delivery, Some(DeliveryMode::Multipart));
    assert!(extraction.retained);
    assert!(body.starts_with("Content-Type: multipart/mixed; boundary=\"gmueowcs\""));
    assert!(body.contains("Content-Type: text/xml\r\n\r\n<wcseo:RectifiedDataset"));
    assert!(body.ends_with("--gmueowcs--\r\n"));
    assert!(extraction.output.exists());
    assert_eq!(file_count(&fixture.temp), 1);
}

#[test]
fn test_store_answers_with_a_reference() {
    let fixture = fixture();
    let (result, body) = respond(&fixture, "coverageid=MOD13C1_NDVI&format=image/tiff&store=true");
    let extraction = result.unwrap();

    let name = extraction.output.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("MOD13C1_NDVI_"));
    assert!(body.contains(&format!("xlink:href=\"http://localhost/output/{}\"", name)));
    assert!(extraction.output.exists());
}

#[test]
fn test_trmm_is_materialized_on_the_fixed_grid() {
    let fixture = fixture();
    let (result, _) = respond(&fixture, "coverageid=TRMM:/data/3B42.20100101.7.nc:Daily&format=application/x-netcdf");
    result.unwrap();

    let copies = fixture.io.copies();
    let materialized = &copies[0];
    assert_eq!(materialized.source, "/data/3B42.20100101.7.nc");
    assert_eq!(materialized.srs.as_deref(), Some("EPSG:4326"));
    let bounds = materialized.bounds.unwrap();
    assert_eq!((bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y), (-180.0, -50.0, 180.0, 50.0));
    assert_eq!(materialized.no_data, Some(-9999.9));

    let job = fixture.io.resamples().pop().unwrap();
    assert!(job.source.ends_with(".nc.tmp.tif"));
    assert_eq!(copies.last().unwrap().driver, "netCDF");
    assert_eq!(file_count(&fixture.temp), 0);
}

#[test]
fn test_resampler_failure_cleans_up() {
    let fixture = fixture();
    fixture.io.fail_resample(true);
    let (result, body) = respond(&fixture, "coverageid=MOD13C1_NDVI&format=image/tiff&rangesubset=2");
    let err = result.err().unwrap();

    assert_eq!(err.code(), ExceptionCode::NoApplicableCode);
    assert!(body.is_empty());
    assert_eq!(fixture.io.copies().len(), 1);
    assert_eq!(file_count(&fixture.temp), 0);
}

#[test]
fn test_unknown_coverage_family() {
    let fixture = fixture();
    let (result, _) = respond(&fixture, "coverageid=GRIB:/data/gfs.grb:TMP&format=image/tiff");
    let err = result.err().unwrap();
    assert_eq!(err.code(), ExceptionCode::NoApplicableCode);
    assert_eq!(err.message(), "The coverage \"GRIB:/data/gfs.grb:TMP\" is not supported.");
}

#[test]
fn test_full_request_url_is_accepted() {
    let fixture = fixture();
    let request = fixture
        .service
        .parse_request(
            "http://localhost/cgi-bin/eowcs?service=WCS&version=2.0.0&request=DescribeCoverage&coverageid=a,b",
            false,
        )
        .unwrap();
    match request {
        ServiceRequest::DescribeCoverage { coverage_ids } => assert_eq!(coverage_ids, vec!["a", "b"]),
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn test_describe_nitf() {
    let fixture = fixture();
    let description = fixture.service.describe(NITF).unwrap();
    assert!(description.starts_with("Coverage: NITF:"));
    assert!(description.contains("  Driver: NITF\n"));
    assert!(description.contains("  Size: 1024x1024\n"));
    assert!(description.contains("  Missing value: 0\n"));
    assert!(!description.contains("Time:"));

    let catalog_description = fixture.service.describe("MOD13C1_NDVI").unwrap();
    assert!(catalog_description.contains("  Time: 2010-10-16T00:00:00Z / 2010-10-31T23:59:59Z\n"));
}

#[test]
fn test_describe_swath_without_geolocation() {
    let fixture = fixture();
    let description = fixture.service.describe(SWATH).unwrap();
    let lines: Vec<&str> = description.lines().collect();
    assert_eq!(lines[0], format!("Coverage: {}", SWATH));
    assert!(lines.contains(&"  Georeferencing: none (pixel coordinates)"));
    assert!(lines.contains(&"  Size: 270x406"));
    assert!(description.ends_with('\n'));
}
