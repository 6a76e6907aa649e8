use divan::Bencher;
use sincstretch::{Float, Source};

use shared::{drain, stereo_tone};

fn main() {
    divan::main();
}

#[divan::bench]
fn passthrough(bencher: Bencher) {
    bencher
        .with_inputs(stereo_tone)
        .bench_values(|source| drain(source.resample(44100).speed_change(1.0)))
}

// taken from: https://github.com/audiojs/sample-rate/readme.md commit: be31b67
const COMMON_SAMPLE_RATES: [u32; 8] = [
    8_000, 11_025, 16_000, 22_050, 32_000, 48_000, 88_200, 96_000,
];

#[divan::bench(args = COMMON_SAMPLE_RATES)]
fn resample_to(bencher: Bencher, target_sample_rate: u32) {
    bencher
        .with_inputs(stereo_tone)
        .bench_values(|source| drain(source.resample(target_sample_rate)))
}

#[divan::bench(args = [0.5, 0.8, 1.25, 2.0])]
fn speed_change(bencher: Bencher, ratio: Float) {
    bencher
        .with_inputs(stereo_tone)
        .bench_values(|source| drain(source.speed_change(ratio)))
}

#[divan::bench]
fn resample_then_speed_change(bencher: Bencher) {
    bencher
        .with_inputs(stereo_tone)
        .bench_values(|source| drain(source.resample(48000).speed_change(1.5)))
}
