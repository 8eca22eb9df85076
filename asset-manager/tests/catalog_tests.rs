use asset_manager::{AssetError, PitchProfile, SoundCatalog, SoundDescriptor, SoundId};

#[test]
fn alias_replaces_descriptor_entirely() {
    let catalog = SoundCatalog::from_descriptors([
        SoundDescriptor::new(1, "plasma", "DSPLASMA", 64).with_singularity(2),
        SoundDescriptor::new(2, "plasma2", "UNUSED", 10).with_alias(1),
    ]);
    let r = catalog.resolve(SoundId(2)).unwrap();
    assert_eq!(r.data.id, SoundId(1));
    assert_eq!(r.priority, 64);
    assert_eq!(r.singularity, 2);
    assert_eq!(r.pitch, None);
}

#[test]
fn link_keeps_requested_priority_and_applies_adjustments() {
    let catalog = SoundCatalog::from_descriptors([
        SoundDescriptor::new(1, "chgun", "DSPISTOL", 64)
            .with_link(2, 150, -20)
            .with_pitch_profile(PitchProfile::Doom),
        SoundDescriptor::new(2, "pistol", "DSPISTOL", 64).with_distances(100, 900),
    ]);
    let r = catalog.resolve(SoundId(1)).unwrap();
    assert_eq!(r.data.id, SoundId(2));
    assert_eq!(r.data.clipping_dist, 900);
    assert_eq!(r.pitch, Some(150));
    assert_eq!(r.volume_adjust, -20);
    assert_eq!(r.pitch_profile, PitchProfile::Doom);
}

#[test]
fn alias_then_link_chain_flattens() {
    let catalog = SoundCatalog::from_descriptors([
        SoundDescriptor::new(1, "a", "A", 5).with_alias(2),
        SoundDescriptor::new(2, "b", "B", 7).with_link(3, 128, 0),
        SoundDescriptor::new(3, "c", "C", 9),
    ]);
    let r = catalog.resolve(SoundId(1)).unwrap();
    assert_eq!(r.data.id, SoundId(3));
    assert_eq!(r.priority, 7);
}

#[test]
fn cycles_are_bounded() {
    let catalog = SoundCatalog::from_descriptors([
        SoundDescriptor::new(1, "a", "A", 5).with_link(2, 128, 0),
        SoundDescriptor::new(2, "b", "B", 5).with_link(1, 128, 0),
    ]);
    assert_eq!(catalog.resolve(SoundId(1)).unwrap_err(), AssetError::ChainTooLong(SoundId(1)));

    let self_alias = SoundCatalog::from_descriptors([SoundDescriptor::new(7, "x", "X", 1).with_alias(7)]);
    assert!(matches!(self_alias.resolve(SoundId(7)), Err(AssetError::ChainTooLong(_))));
}

#[test]
fn dangling_reference_is_unknown_sound() {
    let catalog = SoundCatalog::from_descriptors([SoundDescriptor::new(1, "a", "A", 5).with_alias(42)]);
    assert_eq!(catalog.resolve(SoundId(1)).unwrap_err(), AssetError::UnknownSound(SoundId(42)));
    assert_eq!(catalog.resolve(SoundId(9)).unwrap_err(), AssetError::UnknownSound(SoundId(9)));
}

#[test]
fn descriptors_deserialize_with_defaults() {
    let json = r#"{"id": 4, "name": "pain", "lump": "DSPOPAIN", "priority": 96, "singularity": 1}"#;
    let d: SoundDescriptor = serde_json::from_str(json).unwrap();
    assert_eq!(d.close_dist, 200);
    assert_eq!(d.clipping_dist, 1200);
    assert_eq!(d.link_pitch, 128);
    assert_eq!(d.pitch_profile, PitchProfile::None);
}
