use secrecy::ExposeSecret;
use strongbox_crypto::{
    decrypt_payload, encrypt_payload, generate_file_key, generate_nonce, issue_default_key_pair,
    open_file, seal_file, CipherSuite,
};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt_payload_gcm(bencher: divan::Bencher, size: usize) {
    let key = generate_file_key().unwrap();
    let nonce = generate_nonce().unwrap();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            encrypt_payload(
                CipherSuite::Aes256Gcm,
                divan::black_box(&data),
                divan::black_box(&key),
                divan::black_box(&nonce),
            )
            .unwrap()
        });
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt_payload_cbc(bencher: divan::Bencher, size: usize) {
    let key = generate_file_key().unwrap();
    let nonce = generate_nonce().unwrap();
    let data = make_data(size);
    let encrypted = encrypt_payload(CipherSuite::Aes256CbcPkcs7, &data, &key, &nonce).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            decrypt_payload(
                CipherSuite::Aes256CbcPkcs7,
                divan::black_box(&encrypted),
                divan::black_box(&key),
                divan::black_box(&nonce),
            )
            .unwrap()
        });
}

#[divan::bench(args = [1024, 1048576])]
fn bench_seal_file(bencher: divan::Bencher, size: usize) {
    let pair = issue_default_key_pair().unwrap();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| seal_file(divan::black_box(&data), divan::black_box(&pair.public_pem)).unwrap());
}

#[divan::bench(args = [1024, 1048576])]
fn bench_open_file(bencher: divan::Bencher, size: usize) {
    let pair = issue_default_key_pair().unwrap();
    let envelope = seal_file(&make_data(size), &pair.public_pem).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            open_file(
                divan::black_box(&envelope),
                divan::black_box(pair.private_pem.expose_secret()),
            )
            .unwrap()
        });
}

#[divan::bench(sample_count = 5)]
fn bench_issue_key_pair() {
    issue_default_key_pair().unwrap();
}

fn main() {
    divan::main();
}
