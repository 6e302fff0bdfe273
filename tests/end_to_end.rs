//! End-to-end upload scenarios against the high-level depot API

use depot_rs::{Depot, DepotBuilder, DepotError, PackageQuery, PackageType, PoolPlacement};

#[test]
fn test_upload_then_reupload_same_package() {
    let depot = Depot::new();
    depot.create_repository("bionic").unwrap();

    // Fresh repository starts at version 0 with empty membership
    let v0 = depot.get_latest_version("bionic").unwrap();
    assert_eq!(v0.number(), 0);
    assert_eq!(v0.package_count(), 0);

    // First upload lands as version 1
    let first = depot
        .upload_package(b"artifact A", Some("foo.deb"), None, Some("bionic"))
        .unwrap();
    assert!(first.created);

    let v1 = first.version.unwrap();
    assert_eq!(v1.number(), 1);
    assert_eq!(v1.package_count(), 1);
    assert!(v1.contains(first.package.id()));

    // Identical re-upload: same package identity, no new version
    let second = depot
        .upload_package(b"artifact A", Some("foo.deb"), None, Some("bionic"))
        .unwrap();
    assert!(!second.created);
    assert_eq!(second.package.id(), first.package.id());
    assert_eq!(second.version.unwrap().number(), 1);
    assert_eq!(depot.get_latest_version("bionic").unwrap().number(), 1);
}

#[test]
fn test_structured_upload_creates_pool_path() {
    let depot = Depot::new();
    let repository = depot.create_repository("structured").unwrap();
    assert_eq!(repository.latest().number(), 0);

    let placement = PoolPlacement::new("bionic", "main", "frigg_1.0_amd64.deb");
    let outcome = depot
        .upload_package(b"frigg bytes", None, Some(&placement), Some("structured"))
        .unwrap();

    assert_eq!(
        outcome.package.relative_path(),
        "pool/bionic/main/f/frigg/frigg_1.0_amd64.deb"
    );
    assert_eq!(depot.get_latest_version("structured").unwrap().number(), 1);

    // The recorded path is the one listings find
    let listed = depot.list_packages(&PackageQuery::by_path(
        "pool/bionic/main/f/frigg/frigg_1.0_amd64.deb",
    ));
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id(), outcome.package.id());
}

#[test]
fn test_crud_surface_matches_contract() {
    let depot = Depot::new();

    let artifact = depot.store_artifact(b"crud bytes").unwrap();
    let (package, _) = depot
        .create_package(artifact.digest, Some("crud.deb"), None)
        .unwrap();

    // Read works and round-trips the attributes
    let read_back = depot.read_package(package.id()).unwrap();
    assert_eq!(read_back.relative_path(), "crud.deb");
    assert_eq!(read_back.digest(), artifact.digest);

    // Exactly one package exists at this path
    let listed = depot.list_packages(&PackageQuery::by_path("crud.deb"));
    assert_eq!(listed.len(), 1);

    // Update and delete are unsupported, not missing
    assert!(matches!(
        depot.catalog().update_package(package.id()),
        Err(DepotError::UnsupportedOperation(_))
    ));
    assert!(matches!(
        depot.catalog().delete_package(package.id()),
        Err(DepotError::UnsupportedOperation(_))
    ));

    // The attempts changed nothing
    let after = depot.read_package(package.id()).unwrap();
    assert_eq!(after.as_ref(), read_back.as_ref());
}

#[test]
fn test_distinct_content_same_path_both_listed() {
    let depot = Depot::new();

    let a = depot.store_artifact(b"version one").unwrap();
    let b = depot.store_artifact(b"version two").unwrap();

    let (pkg_a, _) = depot.create_package(a.digest, Some("pkg.deb"), None).unwrap();
    let (pkg_b, _) = depot.create_package(b.digest, Some("pkg.deb"), None).unwrap();
    assert_ne!(pkg_a.id(), pkg_b.id());

    let listed = depot.list_packages(&PackageQuery::by_path("pkg.deb"));
    assert_eq!(listed.len(), 2);
}

#[test]
fn test_source_package_flow() {
    let depot = Depot::new();
    depot.create_repository("sources").unwrap();

    let dsc = depot.store_artifact(b"dsc descriptor").unwrap();
    let orig = depot.store_artifact(b"orig tarball").unwrap();
    let debian = depot.store_artifact(b"debian tarball").unwrap();

    let (package, created) = depot
        .create_source_package(
            dsc.digest,
            &[orig.digest, debian.digest],
            Some("pkg_1.0.dsc"),
            None,
        )
        .unwrap();
    assert!(created);
    assert_eq!(package.package_type(), PackageType::Source);
    assert_eq!(package.companions().len(), 2);

    // Same descriptor + path: same identity, companions not revisited
    let (again, created) = depot
        .create_source_package(dsc.digest, &[orig.digest], Some("pkg_1.0.dsc"), None)
        .unwrap();
    assert!(!created);
    assert_eq!(again.id(), package.id());
    assert_eq!(again.companions().len(), 2);

    let version = depot.add_packages("sources", &[package.id()]).unwrap();
    assert_eq!(version.number(), 1);

    // Companions count as references for GC purposes
    assert!(depot.is_referenced(&orig.digest));
}

#[test]
fn test_filesystem_backed_depot() {
    let dir = tempfile::TempDir::new().unwrap();
    let depot = DepotBuilder::new().at_path(dir.path()).build().unwrap();
    depot.create_repository("disk").unwrap();

    let outcome = depot
        .upload_package(b"disk payload", Some("disk.deb"), None, Some("disk"))
        .unwrap();

    assert_eq!(depot.content(&outcome.package.digest()).unwrap(), b"disk payload");
    assert_eq!(depot.get_latest_version("disk").unwrap().number(), 1);

    // Re-upload still dedupes with blobs on disk
    let again = depot
        .upload_package(b"disk payload", Some("disk.deb"), None, Some("disk"))
        .unwrap();
    assert!(!again.created);
    assert_eq!(depot.get_latest_version("disk").unwrap().number(), 1);
}

#[test]
fn test_membership_survives_across_versions() {
    let depot = Depot::new();
    depot.create_repository("history").unwrap();

    let mut ids = Vec::new();
    for i in 0..5 {
        let outcome = depot
            .upload_package(
                format!("payload {}", i).as_bytes(),
                Some(format!("pkg{}.deb", i).as_str()),
                None,
                Some("history"),
            )
            .unwrap();
        ids.push(outcome.package.id());
    }

    // Every historical version is still addressable and frozen
    for n in 0..=5u64 {
        let v = depot.get_version("history", n).unwrap();
        assert_eq!(v.number(), n);
        assert_eq!(v.package_count(), n as usize);
    }

    // Remove two packages, then verify old versions are untouched
    let v6 = depot.remove_packages("history", &ids[..2]).unwrap();
    assert_eq!(v6.number(), 6);
    assert_eq!(v6.package_count(), 3);

    let v5 = depot.get_version("history", 5).unwrap();
    assert_eq!(v5.package_count(), 5);
    assert!(v5.contains(ids[0]));
}
