use chrono::NaiveDate;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal_macros::dec;

use comprobantes::core::*;
use comprobantes::signing::{SigningMaterial, XmlSigner};
use comprobantes::xml::{DocumentContext, canonicalize, to_invoice_xml};

const BUNDLE: &[u8] = include_bytes!("../tests/fixtures/bundle_pkcs1.pem");

fn issue_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 17).unwrap()
}

fn company() -> IssuingCompany {
    IssuingCompany {
        id: "bench".into(),
        ruc: "0106079783001".into(),
        establishment: "001".into(),
        emission_point: "001".into(),
        environment: Environment::Test,
        emission_type: EmissionType::Normal,
        legal_name: "Comercial Andina S.A.".into(),
        trade_name: None,
        head_office_address: Some("Av. Solano 1-23, Cuenca".into()),
        establishment_address: None,
        address: None,
        keeps_accounting: true,
    }
}

fn client() -> Client {
    Client {
        id: "c-1".into(),
        identification_type: "05".into(),
        identification: "0102030405".into(),
        legal_name: "María Pérez".into(),
        address: None,
        email: None,
        phone: None,
    }
}

fn access_key(sequence: u32) -> AccessKey {
    AccessKeyBuilder::new(issue_date(), DocumentType::Invoice, "0106079783001")
        .series("001001")
        .sequence(Sequence::new(sequence).unwrap())
        .numeric_code("12345678")
        .build()
        .unwrap()
}

fn invoice(lines: usize) -> InvoiceRequest {
    let mut builder = InvoiceRequestBuilder::new("0106079783001", "17/05/2025").buyer("05", "0102030405");
    for i in 1..=lines {
        builder = builder.add_line(
            LineItemBuilder::new(format!("P{i:04}"), dec!(2), dec!(9.99))
                .description(format!("Producto {i}"))
                .vat("4", dec!(15))
                .build(),
        );
    }
    builder.build().unwrap()
}

fn render(request: &InvoiceRequest) -> String {
    let issuer = company();
    let client = client();
    let key = access_key(1);
    let ctx = DocumentContext {
        issuer: &issuer,
        client: &client,
        access_key: &key,
        sequence: Sequence::FIRST,
        issue_date: issue_date(),
    };
    to_invoice_xml(request, &ctx).unwrap()
}

fn bench_access_key(c: &mut Criterion) {
    c.bench_function("access_key_build", |b| {
        b.iter(|| black_box(access_key(black_box(42))));
    });
    let key = access_key(42);
    c.bench_function("check_digit_48", |b| {
        b.iter(|| black_box(check_digit(black_box(&key.as_str()[..48]))));
    });
}

fn bench_render(c: &mut Criterion) {
    let small = invoice(10);
    c.bench_function("invoice_xml_10_lines", |b| {
        b.iter(|| black_box(render(black_box(&small))));
    });
    let large = invoice(500);
    c.bench_function("invoice_xml_500_lines", |b| {
        b.iter(|| black_box(render(black_box(&large))));
    });
}

fn bench_canonicalize(c: &mut Criterion) {
    let xml = render(&invoice(100));
    c.bench_function("c14n_100_lines", |b| {
        b.iter(|| black_box(canonicalize(black_box(&xml))));
    });
}

fn bench_sign(c: &mut Criterion) {
    let signer = XmlSigner::new(SigningMaterial::from_pem(BUNDLE, None).unwrap());
    let xml = render(&invoice(10));
    c.bench_function("sign_invoice_10_lines", |b| {
        b.iter(|| black_box(signer.sign(black_box(&xml))));
    });
}

criterion_group!(
    benches,
    bench_access_key,
    bench_render,
    bench_canonicalize,
    bench_sign
);
criterion_main!(benches);
