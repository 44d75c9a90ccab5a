mod common;

use common::synthetic_image::{
    biased_fringes, circular_fringes, linear_fringes, median, single_bright_pixel, wrap,
};
use fringe_demod::demod::tracker::normalize_fringes;
use fringe_demod::image::ElementType;
use fringe_demod::{
    demodulate, DemodError, DemodParams, DemodRun, ScanPoint, SeedSelection, StrategyKind,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn gabor_recovers_linear_fringes() {
    init_logger();
    let (w, h) = (64usize, 64usize);
    let (wx, wy) = (0.5, 0.3);
    let img = linear_fringes(w, h, wx, wy, 0.0);
    let mut run =
        DemodRun::with_seed(img.clone(), DemodParams::default(), ScanPoint::new(32, 32)).unwrap();
    let report = run.run_to_completion().unwrap();
    assert!(report.is_complete());

    let fields = run.fields();
    let margin = 16;
    let mut total = 0usize;
    let mut good = 0usize;
    let mut fx = Vec::new();
    let mut fy = Vec::new();
    for y in margin..h - margin {
        for x in margin..w - margin {
            total += 1;
            if (fields.phase.get(x, y).cos() - img.get(x, y)).abs() < 0.1 {
                good += 1;
            }
            fx.push(fields.fx.get(x, y));
            fy.push(fields.fy.get(x, y));
        }
    }
    assert!(
        good as f64 >= 0.95 * total as f64,
        "only {good}/{total} interior pixels match cos(phase)"
    );
    let (mfx, mfy) = (median(fx), median(fy));
    assert!((mfx - wx.sin()).abs() < 0.05, "median fx {mfx:.4}");
    assert!((mfy - wy.sin()).abs() < 0.05, "median fy {mfy:.4}");
}

#[test]
fn gabor_phase_is_continuous_along_the_fringes() {
    let (w, h) = (64usize, 48usize);
    let img = linear_fringes(w, h, 0.6, 0.0, 0.4);
    let mut run =
        DemodRun::with_seed(img, DemodParams::default(), ScanPoint::new(32, 24)).unwrap();
    run.run_to_completion().unwrap();
    let phase = run.phase();
    // Wrapped phase advances by ~0.6 per column in the interior.
    for x in 18..46 {
        let step = wrap(phase.get(x + 1, 24) - phase.get(x, 24));
        assert!((step - 0.6).abs() < 0.05, "step {step:.4} at x={x}");
    }
}

#[test]
fn every_pixel_is_demodulated_exactly_once() {
    init_logger();
    let (w, h) = (40usize, 30usize);
    for strategy in [StrategyKind::Gabor, StrategyKind::Tracker] {
        let img = circular_fringes(w, h, 0.01);
        let params = DemodParams::default().with_strategy(strategy);
        let (fields, report) = demodulate(img, params).unwrap();
        assert_eq!(report.pops, w * h, "{strategy}");
        assert_eq!(report.enqueued, w * h, "{strategy}");
        assert_eq!(report.demodulated, w * h, "{strategy}");
        assert_eq!(report.stopped, 0);
        assert!(fields.demodulated.data.iter().all(|&d| d));
        assert!(fields.phase.data.iter().all(|p| p.is_finite()));
        assert!(fields.fx.data.iter().all(|f| f.is_finite()));
    }
}

#[test]
fn tracker_phase_reproduces_the_normalized_intensity() {
    let (w, h) = (48usize, 48usize);
    let img = linear_fringes(w, h, 0.4, 0.25, 0.0);
    let params = DemodParams::default().with_strategy(StrategyKind::Tracker);
    let mut run = DemodRun::new(img, params).unwrap();
    assert_eq!(run.strategy_name(), "tracker");
    run.run_to_completion().unwrap();

    let fields = run.fields();
    let g = normalize_fringes(&fields.intensity);
    for (p, gv) in fields.phase.data.iter().zip(&g.data) {
        assert!((p.cos() - gv).abs() < 1e-9, "cos({p}) != {gv}");
    }
    let fx: Vec<f64> = fields.fx.data.iter().map(|f| f.abs()).collect();
    let mfx = median(fx);
    assert!((mfx - 0.4).abs() < 0.15, "median |fx| {mfx:.4}");
}

#[test]
fn regularized_tracker_is_unavailable() {
    let img = linear_fringes(8, 8, 0.5, 0.5, 0.0);
    let params = DemodParams::default().with_strategy(StrategyKind::RegularizedTracker);
    let err = DemodRun::new(img, params).err();
    assert!(
        matches!(err, Some(DemodError::Unavailable(_))),
        "unexpected {err:?}"
    );
}

#[test]
fn reset_replays_the_same_run() {
    let img = circular_fringes(32, 24, 0.02);
    let mut run = DemodRun::new(img, DemodParams::default()).unwrap();
    let first = run.run_to_completion().unwrap();
    let phase = run.phase().clone();
    let fx = run.fields().fx.clone();

    run.reset().unwrap();
    assert_eq!(run.fields().demodulated_count(), 0);
    assert_eq!(run.scheduler().pops(), 0);
    assert_eq!(run.scheduler().enqueued(), 1);
    assert!(run.phase().data.iter().all(|&p| p == 0.0));

    let second = run.run_to_completion().unwrap();
    assert_eq!(first.seed, second.seed);
    assert_eq!(first.pops, second.pops);
    assert_eq!(run.phase(), &phase);
    assert_eq!(&run.fields().fx, &fx);
}

#[test]
fn explicit_seed_is_used_and_out_of_bounds_is_rejected() {
    let img = linear_fringes(20, 16, 0.5, 0.1, 0.0);
    let run = DemodRun::with_seed(img.clone(), DemodParams::default(), ScanPoint::new(7, 3))
        .unwrap();
    assert_eq!(run.seed(), ScanPoint::new(7, 3));
    assert_eq!(run.params().seed, SeedSelection::Explicit { x: 7, y: 3 });

    let err = DemodRun::with_seed(img, DemodParams::default(), ScanPoint::new(20, 0)).err();
    assert_eq!(
        err,
        Some(DemodError::SeedOutOfBounds {
            x: 20,
            y: 0,
            width: 20,
            height: 16
        })
    );
}

#[test]
fn tuned_response_seed_lands_in_the_matching_patch() {
    // Fringes only inside a central patch; the rest is flat.
    let (w, h) = (60usize, 40usize);
    let fringes = linear_fringes(w, h, 0.7, 0.2, 0.0);
    let img = fringe_demod::image::Field::from_fn(w, h, |x, y| {
        if (20..40).contains(&x) && (10..30).contains(&y) {
            fringes.get(x, y)
        } else {
            0.0
        }
    });
    let params = DemodParams::default().with_seed(SeedSelection::TunedResponse { wx: 0.7, wy: 0.2 });
    let run = DemodRun::new(img, params).unwrap();
    let seed = run.seed();
    assert!(
        (15..45).contains(&seed.x) && (5..35).contains(&seed.y),
        "seed {seed:?} far from the fringe patch"
    );
}

#[test]
fn bright_pixel_neighbourhood_is_visited_first() {
    let img = single_bright_pixel(10, 10, 5, 5);
    let mut run = DemodRun::new(img, DemodParams::default().with_levels(4)).unwrap();
    assert_eq!(run.seed(), ScanPoint::new(5, 5));
    assert_eq!(run.quality().level(5, 5), 3);

    assert_eq!(run.next().unwrap(), Some(ScanPoint::new(5, 5)));
    assert_eq!(run.next().unwrap(), Some(ScanPoint::new(6, 5)));
    assert_eq!(run.next().unwrap(), Some(ScanPoint::new(5, 6)));
    let report = run.run_to_completion().unwrap();
    assert_eq!(report.demodulated, 100);
}

#[test]
fn scan_threshold_stops_expansion() {
    let img = linear_fringes(24, 24, 0.5, 0.3, 0.0);
    let params = DemodParams::default()
        .with_seed(ScanPoint::new(10, 10))
        .with_scan_min_freq(10.0);
    let mut run = DemodRun::new(img, params).unwrap();
    let report = run.run_to_completion().unwrap();
    // Only the seed expands.
    assert_eq!(report.pops, 9);
    assert_eq!(report.demodulated, 9);
    assert_eq!(report.stopped, 8);
    assert!(!report.is_complete());
    assert!(run.fields().is_demodulated(11, 11));
    assert!(!run.fields().is_demodulated(12, 12));
}

#[test]
fn background_removal_centres_the_intensity() {
    let (w, h) = (64usize, 64usize);
    let img = biased_fringes(w, h, 0.6, 0.4);
    let params = DemodParams::default()
        .with_dc_removal(8.0)
        .with_prefilter(1.0)
        .with_seed(ScanPoint::new(32, 32));
    let mut run = DemodRun::new(img, params).unwrap();
    let report = run.run_to_completion().unwrap();
    assert!(report.is_complete());
    assert!(report.timings.stage("preprocess").is_some());
    assert!(report.timings.stage("traversal").is_some());

    let intensity = &run.fields().intensity;
    let mut sum = 0.0;
    let mut n = 0usize;
    for y in 16..48 {
        for x in 16..48 {
            sum += intensity.get(x, y);
            n += 1;
        }
    }
    let mean = sum / n as f64;
    assert!(mean.abs() < 0.05, "interior mean {mean:.4} after background removal");
}

#[test]
fn single_precision_kernels_track_double_precision() {
    let img = linear_fringes(40, 40, 0.5, 0.3, 0.0);
    let seed = ScanPoint::new(20, 20);
    let mut params = DemodParams::default().with_seed(seed);
    let (f64_fields, _) = demodulate(img.clone(), params.clone()).unwrap();
    params.gabor.precision = ElementType::F32;
    let (f32_fields, _) = demodulate(img, params).unwrap();
    for y in 12..28 {
        for x in 12..28 {
            let d = wrap(f64_fields.phase.get(x, y) - f32_fields.phase.get(x, y));
            assert!(d.abs() < 1e-3, "({x}, {y}) differs by {d}");
        }
    }
}

#[test]
fn report_serializes_to_camel_case_json() {
    let (_, report) = demodulate(linear_fringes(12, 10, 0.5, 0.2, 0.0), DemodParams::default())
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["width"], 12);
    assert_eq!(json["demodulated"], 120);
    assert_eq!(json["strategy"], "gabor");
    assert!(json["timings"]["totalMs"].is_number());
    assert_eq!(json["quality"]["histogram"].as_array().map(Vec::len), Some(32));
}
