use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use aes_engine::{run_session, Block, ControllerConfig, EngineConfig, EngineController, Key, Pacing};
use aes_engine_sim::{SimConfig, SimCore};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

fn reference(key: &[u8; 16], input: &[Block]) -> Vec<Block> {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    input
        .iter()
        .map(|block| {
            let mut buf = GenericArray::clone_from_slice(block);
            cipher.encrypt_block(&mut buf);
            let mut out = [0u8; 16];
            out.copy_from_slice(&buf);
            out
        })
        .collect()
}

fn random_blocks(rng: &mut impl RngCore, n: usize) -> Vec<Block> {
    (0..n)
        .map(|_| {
            let mut block = [0u8; 16];
            rng.fill_bytes(&mut block);
            block
        })
        .collect()
}

fn run(latency: u32, depth: usize, pacing: Pacing, key: &Key, input: &[Block]) -> Vec<Block> {
    let sim = SimCore::with_config(SimConfig {
        latency,
        ..SimConfig::default()
    });
    let limits = ControllerConfig {
        pipeline_depth: depth,
        ..ControllerConfig::default()
    };
    let mut engine = EngineController::with_config(sim, limits).unwrap();
    let out = run_session(&mut engine, EngineConfig::encrypt_128(), key, &pacing, input).unwrap();
    let stats = engine.regs().stats();
    assert_eq!(stats.overruns, 0);
    assert_eq!(stats.stale_reads, 0);
    assert_eq!(stats.retrieved, input.len() as u64);
    out
}

#[test]
fn disciplines_agree_on_random_streams() {
    let mut rng = ChaCha20Rng::from_seed([7u8; 32]);
    for n in 1..=12 {
        let mut key_bytes = [0u8; 16];
        rng.fill_bytes(&mut key_bytes);
        let key = Key::from(key_bytes);
        let input = random_blocks(&mut rng, n);
        let latency = rng.gen_range(0..6);

        let manual = run(latency, 2, Pacing::Manual, &key, &input);
        let pipelined = run(latency, 2, Pacing::Pipelined, &key, &input);
        assert_eq!(manual, pipelined, "n={n} latency={latency}");
        assert_eq!(manual, reference(&key_bytes, &input), "n={n}");
    }
}

#[test]
fn depth_one_matches_depth_two() {
    let mut rng = ChaCha20Rng::from_seed([9u8; 32]);
    let key_bytes = [0x42u8; 16];
    let key = Key::from(key_bytes);
    let input = random_blocks(&mut rng, 9);
    assert_eq!(
        run(3, 1, Pacing::Pipelined, &key, &input),
        run(3, 2, Pacing::Pipelined, &key, &input)
    );
}

#[test]
fn pipelining_takes_fewer_cycles() {
    let key = Key::from([1u8; 16]);
    let input = random_blocks(&mut ChaCha20Rng::from_seed([3u8; 32]), 16);

    let cycles = |pacing: Pacing| {
        let mut engine = EngineController::new(SimCore::with_config(SimConfig {
            latency: 8,
            ..SimConfig::default()
        }));
        run_session(&mut engine, EngineConfig::encrypt_128(), &key, &pacing, &input).unwrap();
        engine.regs().stats().status_reads
    };
    assert!(cycles(Pacing::Pipelined) < cycles(Pacing::Manual));
}
