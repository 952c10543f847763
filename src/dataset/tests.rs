use super::*;

fn header() -> CrdHeader {
    CrdHeader::new(100, 0, 50, 0.0, 5)
}

#[test]
fn test_new_builds_contiguous_map() {
    let dataset =
        ArrivalDataset::new("test", header(), vec![0, 2, 1, 5, 3], (0..11).collect()).unwrap();

    assert_eq!(dataset.nof_shots(), 5);
    assert_eq!(
        dataset.shot_to_arrival_map(),
        &[
            ShotRange::new(0, 0),
            ShotRange::new(0, 2),
            ShotRange::new(2, 3),
            ShotRange::new(3, 8),
            ShotRange::new(8, 11),
        ]
    );
    assert_eq!(dataset.arrivals_of_shot(3), &[3, 4, 5, 6, 7]);
    assert!(dataset.arrivals_of_shot(0).is_empty());
}

#[test]
fn test_shot_slices_reproduce_arrivals() {
    let arrivals = vec![17, 42, 20, 5, 9, 40];
    let dataset = ArrivalDataset::new("test", header(), vec![0, 2, 1, 3], arrivals.clone()).unwrap();

    let concatenated: Vec<u32> = (0..dataset.nof_shots())
        .flat_map(|shot| dataset.arrivals_of_shot(shot).iter().copied())
        .collect();
    assert_eq!(concatenated, arrivals);
    assert_eq!(dataset.arrival_range(), Some((5, 42)));
}

#[test]
fn test_arrival_count_mismatch() {
    let result = ArrivalDataset::new("test", header(), vec![1, 2], vec![1, 2]);
    assert_eq!(
        result.unwrap_err(),
        DatasetError::ArrivalCountMismatch {
            expected: 3,
            found: 2
        }
    );
}

#[test]
fn test_from_parts_rejects_inconsistent_map() {
    let result = ArrivalDataset::from_parts(
        "test",
        header(),
        vec![1, 1],
        vec![ShotRange::new(0, 1), ShotRange::new(1, 3)],
        vec![4, 5, 6],
    );
    assert!(matches!(
        result,
        Err(DatasetError::IonCountMismatch { shot: 1, .. })
    ));

    let result = ArrivalDataset::from_parts(
        "test",
        header(),
        vec![1, 1],
        vec![ShotRange::new(0, 1), ShotRange::new(2, 3)],
        vec![4, 5, 6],
    );
    assert_eq!(result.unwrap_err(), DatasetError::NonContiguousShot(1));
}

#[test]
fn test_invalid_header() {
    let result = ArrivalDataset::new("test", CrdHeader::new(0, 0, 10, 0.0, 0), vec![], vec![]);
    assert!(matches!(result, Err(DatasetError::InvalidHeader(_))));

    let result = ArrivalDataset::new("test", CrdHeader::new(100, 10, 5, 0.0, 0), vec![], vec![]);
    assert!(matches!(result, Err(DatasetError::InvalidHeader(_))));
}

#[test]
fn test_empty_dataset_uses_header_range() {
    let dataset = ArrivalDataset::new("empty", header(), vec![0, 0], vec![]).unwrap();
    assert_eq!(dataset.arrival_range(), None);
    assert_eq!(dataset.spectrum_bin_range(), (0, 50));
}

#[test]
fn test_us_to_bin() {
    // 100 ps bins, no offset: 1 us is 10,000 bins
    let header = header();
    assert_eq!(header.us_to_chan(), 10_000.0);
    assert_eq!(header.us_to_bin(1.0), 10_000);
    assert_eq!(header.us_to_bin(-1.0), 0);
}

#[test]
fn test_json_roundtrip_validates() {
    let dataset = ArrivalDataset::new("json", header(), vec![1, 2], vec![3, 4, 5]).unwrap();
    let json = serde_json::to_string(&dataset).unwrap();
    let back: ArrivalDataset = serde_json::from_str(&json).unwrap();
    assert_eq!(back, dataset);

    let broken = r#"{"name":"x","header":{"bin_length":100,"bin_start":0,"bin_end":5,
        "delta_t":0.0,"nof_shots":1},"ions_per_shot":[2],"all_arrivals":[1]}"#;
    assert!(serde_json::from_str::<ArrivalDataset>(broken).is_err());
}
