use fringe_analysis_core::store::load_power;
use fringe_analysis_core::{
    fringe_cal, fringe_cal_aggregate, logging, sim_fringe, sim_fringe_seeded, CalibrationOptions,
    CarrierFreq, Image,
};
use ndarray::Array2;
use tempfile::tempdir;

/// 640 pixels wide, 480 high.
const SHAPE: (usize, usize) = (480, 640);

const CARRIERS: [(f64, f64); 3] = [(3.0, 4.0), (18.3, 1.3), (22.22, 11.11)];

fn options(do_embed: bool) -> CalibrationOptions {
    CalibrationOptions {
        do_embed,
        store_pow: false,
        ..CalibrationOptions::default()
    }
}

fn flat_fringes(cf: CarrierFreq, noise: f64, seed: u64) -> Image {
    sim_fringe_seeded(&Array2::zeros(SHAPE), cf, noise, seed).unwrap()
}

fn assert_close(found: CarrierFreq, truth: CarrierFreq, component_tol: f64, sum_tol: f64) {
    assert!(
        (found.u - truth.u).abs() < component_tol && (found.v - truth.v).abs() < component_tol,
        "components: found {found}, expected {truth}"
    );
    assert!(
        (found.sum() - truth.sum()).abs() < sum_tol,
        "sum: found {found}, expected {truth}"
    );
}

#[test]
fn calibration_without_embedding_is_within_half_a_bin() {
    let images: Vec<Image> = CARRIERS
        .iter()
        .map(|&cf| flat_fringes(cf.into(), 0.0, 0))
        .collect();
    let cal = fringe_cal(&images, &options(false)).unwrap();
    assert_eq!(cal.cfreqs.len(), CARRIERS.len());
    for (found, &truth) in cal.cfreqs.iter().zip(CARRIERS.iter()) {
        assert_close(*found, truth.into(), 0.5, 0.5);
    }
}

#[test]
fn embedded_calibration_is_sub_bin_accurate() {
    for &truth in &CARRIERS {
        let cal = fringe_cal(&[flat_fringes(truth.into(), 0.0, 0)], &options(true)).unwrap();
        assert_close(cal.cfreqs[0], truth.into(), 0.15, 0.05);
    }
}

#[test]
fn calibration_tolerates_noise() {
    for (seed, &truth) in CARRIERS.iter().enumerate() {
        let image = flat_fringes(truth.into(), 0.5, seed as u64 + 1);

        let coarse = fringe_cal(&[image.clone()], &options(false)).unwrap();
        assert_close(coarse.cfreqs[0], truth.into(), 0.5, 0.5);

        let fine = fringe_cal(&[image], &options(true)).unwrap();
        assert_close(fine.cfreqs[0], truth.into(), 0.15, 0.05);
    }
}

#[test]
fn error_grows_gracefully_with_noise() {
    let truth = CarrierFreq::new(22.22, 11.11);
    for (seed, noise) in [0.0, 1.0, 2.0].into_iter().enumerate() {
        let image = flat_fringes(truth, noise, 100 + seed as u64);
        let found = fringe_cal(&[image], &options(false)).unwrap().cfreqs[0];
        let [pu, pv] = found.permille_ratio(&truth);
        println!("noise {noise}: cfreq {found}, per-mille ratio ({pu:.2}, {pv:.2})");

        assert!(found.is_finite());
        assert!((found.u - truth.u).abs() < 0.5 && (found.v - truth.v).abs() < 0.5);
    }
}

#[test]
fn aggregate_matches_single_image_carrier() {
    let truth = CarrierFreq::new(7.3, 4.6);
    let images: Vec<Image> = (0..4)
        .map(|seed| sim_fringe_seeded(&Array2::zeros((96, 80)), truth, 1.0, seed).unwrap())
        .collect();
    let options = CalibrationOptions {
        store_pow: false,
        ..CalibrationOptions::default()
    };
    let found = fringe_cal_aggregate(&images, &options).unwrap();
    assert!((found.u - truth.u).abs() < 0.1, "{found}");
    assert!((found.v - truth.v).abs() < 0.1, "{found}");
}

#[test]
fn store_pow_writes_spectra_and_log() {
    let dir = tempdir().unwrap();
    let truth = CarrierFreq::new(5.0, 3.0);
    let images = vec![sim_fringe(&Array2::zeros((32, 24)), truth, 0.0).unwrap(); 2];
    let options = CalibrationOptions {
        outdir: dir.path().to_path_buf(),
        ret_pow: true,
        ..CalibrationOptions::default()
    };

    let cal = fringe_cal(&images, &options).unwrap();
    assert_eq!(cal.stored.len(), 2);
    let returned = cal.power.unwrap();
    for (path, pow) in cal.stored.iter().zip(returned.iter()) {
        assert_eq!(&load_power(path).unwrap(), pow);
    }

    let log = logging::read_calibration_log(dir.path().join(logging::CALIBRATION_LOG)).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].image_index, 1);
    assert_eq!(log[0].cfreq, [cal.cfreqs[0].u, cal.cfreqs[0].v]);
}
