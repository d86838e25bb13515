use std::{collections::HashMap, path::Path};

use image::{DynamicImage, GenericImageView as _, ImageFormat, Rgba, RgbaImage};

use crate::{
    fetch::{self, tests::CannedClient},
    link::{LinkOutcome, Linker},
    normalize::Normalizer,
    store::{CatalogStore, JsonFileStore},
};

const CATALOG: &str = include_str!("fixtures/wines.json");

fn encode(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([120, 20, 40, 255]),
    ));
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.into_rgb8()),
        _ => image,
    };
    let mut body = std::io::Cursor::new(Vec::new());
    image.write_to(&mut body, format).unwrap();
    body.into_inner()
}

fn site(root: &Path) -> (JsonFileStore, std::path::PathBuf) {
    let data = root.join("feniks-data");
    let images = data.join("images");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("wines.json"), CATALOG).unwrap();
    (JsonFileStore::new(data.join("wines.json")), images)
}

#[tokio::test]
async fn fetch_normalize_link_round_trip() {
    let root = tempfile::tempdir().unwrap();
    let (store, images) = site(root.path());
    let client = CannedClient {
        bodies: HashMap::from([
            (
                "https://cdn.feniks.test/bottles/tempranillo.png".to_owned(),
                encode(ImageFormat::Png, 300, 900),
            ),
            (
                "https://cdn.feniks.test/bottles/cava.jpg".to_owned(),
                encode(ImageFormat::Jpeg, 1000, 400),
            ),
            (
                "https://cdn.feniks.test/".to_owned(),
                encode(ImageFormat::Png, 50, 50),
            ),
        ]),
        ..Default::default()
    };

    let report = fetch::run(&store, &client, &images).await.unwrap();
    assert_eq!(report.downloaded, 3);
    assert!(report.is_success());
    assert!(images.join("wine_101_tempranillo.png").is_file());
    assert!(images.join("wine_3_image.jpg").is_file());

    // normalized files replace the originals in the images root
    let report = Normalizer::default().run(&images, &images).unwrap();
    assert_eq!(report.processed, 3);

    let linker = Linker {
        source_dir: images.clone(),
        path_prefix: "feniks-data/images".to_owned(),
    };
    let report = linker.run(&store).unwrap();
    assert_eq!(report.outcome(), LinkOutcome::Complete);

    let catalog = store.load().unwrap();
    for wine in &catalog.wines {
        let local = wine.image_local().unwrap();
        let image = image::open(root.path().join(local)).unwrap();
        assert_eq!(image.dimensions(), (600, 600));
    }
    assert_eq!(
        catalog.wines[0].image_local(),
        Some("feniks-data/images/wine_101_tempranillo.jpg")
    );
    assert_eq!(
        catalog.wines[0].translation(crate::catalog::TranslatableField::Desc, "nl"),
        Some("Krachtige rode wijn met tonen van bosvruchten")
    );
}

#[tokio::test]
async fn malformed_catalog_fetches_nothing() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("wines.json");
    std::fs::write(&path, "{\"wines\": [").unwrap();
    let images = root.path().join("images");
    let client = CannedClient::default();

    let result = fetch::run(&JsonFileStore::new(&path), &client, &images).await;
    assert!(matches!(result, Err(fetch::Error::Catalog(_))));
    assert!(!images.exists());
    assert!(client.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn second_fetch_skips_existing_files() {
    let root = tempfile::tempdir().unwrap();
    let (store, images) = site(root.path());
    let client = CannedClient {
        bodies: HashMap::from([(
            "https://cdn.feniks.test/bottles/cava.jpg".to_owned(),
            b"jpeg".to_vec(),
        )]),
        ..Default::default()
    };
    let first = fetch::run(&store, &client, &images).await.unwrap();
    assert_eq!((first.downloaded, first.failed), (1, 2));

    let second = fetch::run(&store, &client, &images).await.unwrap();
    assert_eq!((second.downloaded, second.skipped, second.failed), (0, 1, 2));
}
