use fringe_analysis_core::config::ConfigError;
use fringe_analysis_core::unwrap::wrap;
use fringe_analysis_core::{
    aperture_mask, filter_sideband, fringe_cal, sim_fringe_seeded, CarrierFreq, FringeConfig,
    WindowCache,
};
use ndarray::Array2;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let shape = (480, 640);
    let truth = CarrierFreq::new(22.22, 11.11);

    let phase = Array2::from_shape_fn(shape, |(i, j)| {
        let y = (i as f64 - 240.0) / 120.0;
        let x = (j as f64 - 320.0) / 160.0;
        1.5 * (-(x * x + y * y)).exp()
    });
    let images: Vec<_> = (0..3)
        .map(|seed| sim_fringe_seeded(&phase, truth, 0.5, seed))
        .collect::<Result<_, _>>()?;

    let calibration = fringe_cal(&images, &config.calibration)?;
    for (index, cfreq) in calibration.cfreqs.iter().enumerate() {
        let [pu, pv] = cfreq.permille_ratio(&truth);
        println!("image {index}: cfreq {cfreq} (per-mille {pu:.3}, {pv:.3})");
    }
    for path in &calibration.stored {
        println!("stored {}", path.display());
    }

    let mask = aperture_mask(shape.0, shape.1, 0.9);
    let mut cache = WindowCache::default();
    for (index, (image, cfreq)) in images.iter().zip(&calibration.cfreqs).enumerate() {
        let out = filter_sideband(image, *cfreq, Some(&mask), &config.sideband, Some(&mut cache))?;
        let rms = (out
            .phase
            .iter()
            .zip(phase.iter())
            .zip(mask.iter())
            .filter(|(_, valid)| **valid)
            .map(|((p, t), _)| wrap(p - t).powi(2))
            .sum::<f64>()
            / mask.iter().filter(|v| **v).count() as f64)
            .sqrt();
        println!("image {index}: phase rms error {rms:.4} rad");
    }
    println!(
        "Window cache: {} hits, {} misses",
        cache.hits(),
        cache.misses()
    );

    Ok(())
}

fn load_config() -> Result<FringeConfig, ConfigError> {
    FringeConfig::load_from_file("config/fringe.toml").or_else(|err| {
        eprintln!("Falling back to default config: {err}");
        Ok(FringeConfig::default())
    })
}
