use mpwmerge::config::MergeConfig;
use mpwmerge::layout::layers::LayerSpec;
use mpwmerge::layout::Layout;
use mpwmerge::merge::{Merger, RESERVED_CATEGORY};
use mpwmerge::occupancy::Occupancy;
use mpwmerge::report::{Placement, RecordKind};
use subgeom::{Point, Rect};

mod common;
use common::{design, design_with_dbu, fixed_time, rect, Workspace, FLOORPLAN, WAVEGUIDE};

const SEM: LayerSpec = LayerSpec::new(200, 0);

fn footprint(p: &Placement) -> Rect {
    Rect::new(Point::new(p.x, p.y), Point::new(p.x + p.width, p.y + p.height))
}

fn merge(ws: &Workspace, config: MergeConfig) -> Merger {
    let mut merger = Merger::with_time(config, fixed_time()).expect("invalid config");
    merger.merge_all(&ws.files()).expect("merge failed");
    merger.finish();
    merger
}

#[test]
fn full_size_designs_fill_separate_columns() {
    let ws = Workspace::new();
    ws.add_submission("EBeam_a.gds", &design("a", 605_000, 410_000));
    ws.add_submission("EBeam_b.gds", &design("b", 605_000, 410_000));
    let config = MergeConfig {
        gap_width: 0,
        gap_height: 0,
        column_height: 820_000,
        ..ws.config()
    };
    let merger = merge(&ws, config);
    let placed: Vec<(i64, i64)> = merger.placements().iter().map(|p| (p.x, p.y)).collect();
    assert_eq!(placed, vec![(0, 410_000), (605_000, 0)]);
}

#[test]
fn default_column_wraps_after_twenty_designs() {
    let ws = Workspace::new();
    for i in 0..21 {
        ws.add_submission(&format!("EBeam_{i:02}.gds"), &design(&format!("d{i}"), 605_000, 410_000));
    }
    let merger = merge(&ws, ws.config());
    let placed: Vec<(i64, i64)> = merger.placements().iter().map(|p| (p.x, p.y)).collect();
    assert_eq!(placed.len(), 21);
    // Each design sits one gap above the previous one.
    for (i, (x, y)) in placed.iter().take(20).enumerate() {
        assert_eq!((*x, *y), (0, 426_000 + 418_000 * i as i64));
    }
    assert_eq!(placed[19].1 + 410_000, 8_778_000);
    assert_eq!(placed[20], (613_000, 0));
}

#[test]
fn sem_layer_is_kept_for_trusted_categories_only() {
    let ws = Workspace::new();
    for name in ["ELEC413_a.gds", "EBeam_b.gds", "SiEPIC_Passives_c.gds", "openEBL_d.gds"] {
        let mut src = design("top", 100_000, 100_000);
        let key = src.cell_by_name("top").unwrap();
        src.cell_mut(key)
            .unwrap()
            .draw_rect(SEM, rect(10_000, 10_000, 20_000, 20_000));
        ws.add_submission(name, &src);
    }
    let merger = merge(&ws, ws.config());
    assert_eq!(merger.placements().len(), 4);
    let canvas = merger.canvas();
    for container in ["ELEC413", "edX", "SiEPIC_Passives"] {
        let key = merger.container(container).unwrap();
        assert!(canvas.layers_under(key).contains(&SEM), "{container} lost 200/0");
    }
    let open = merger.container("openEBL").unwrap();
    assert!(!canvas.layers_under(open).contains(&SEM));
    assert!(canvas.layers_under(open).contains(&WAVEGUIDE));
    assert!(merger
        .report()
        .records_for("openEBL_d.gds")
        .any(|r| r.message == "deleting layer: 200/0"));
    assert!(!merger
        .report()
        .records_for("ELEC413_a.gds")
        .any(|r| r.message == "deleting layer: 200/0"));
}

#[test]
fn invalid_units_skip_only_that_file() {
    let ws = Workspace::new();
    ws.add_submission("EBeam_a.gds", &design("a", 100_000, 100_000));
    let mut lib = design("bad", 100_000, 100_000).to_gds_lib().unwrap();
    lib.units = gds21::GdsUnits::new(1e-3, -1e-9);
    lib.save(ws.submissions().join("EBeam_b.gds")).unwrap();
    ws.add_submission("EBeam_c.gds", &design("c", 100_000, 100_000));

    let merger = merge(&ws, ws.config());
    assert_eq!(merger.num_errors(), 1);
    let files: Vec<&str> = merger.placements().iter().map(|p| p.file.as_str()).collect();
    assert_eq!(files, vec!["EBeam_a.gds", "EBeam_c.gds"]);
    assert!(merger
        .report()
        .records_for("EBeam_b.gds")
        .any(|r| r.kind == RecordKind::Error && r.message.starts_with("cannot rescale database unit")));
}

#[test]
fn aborted_merge_still_writes_its_log() {
    let ws = Workspace::new();
    ws.add_submission("EBeam_a.gds", &design("a", 605_000, 410_000));
    ws.add_submission("EBeam_b.gds", &design("b", 605_000, 410_000));
    let config = MergeConfig {
        chip_width: 1_000_000,
        column_height: 410_000,
        ..ws.config()
    };
    let err = Merger::run_to(config, ws.out()).err().unwrap();
    assert!(err.is_fatal());

    let log = std::fs::read_to_string(ws.out().join("EBeam.txt")).unwrap();
    assert!(log.contains("  - Placed at position: 8000, 0"));
    assert!(log.contains("  - ERROR: no slot available on the canvas"));
    assert!(log.contains("runs past the canvas width 1000000"));
    assert!(!ws.out().join("EBeam.gds").exists());
}

#[test]
fn committed_floorplans_never_overlap() {
    let ws = Workspace::new();
    let sizes = [
        (605_000, 410_000),
        (300_000, 200_000),
        (100_000, 400_000),
        (450_000, 100_000),
        (605_000, 50_000),
        (20_000, 20_000),
        (500_000, 410_000),
        (605_000, 300_000),
        (10_000, 410_000),
        (250_000, 250_000),
        (605_000, 410_000),
        (123_456, 78_901),
    ];
    for (i, (w, h)) in sizes.iter().enumerate() {
        ws.add_submission(&format!("EBeam_{i:02}.gds"), &design(&format!("d{i}"), *w, *h));
    }
    let config = MergeConfig {
        column_height: 2_000_000,
        ..ws.config()
    };
    let merger = merge(&ws, config);
    let placements = merger.placements();
    assert_eq!(placements.len(), sizes.len());

    for (i, a) in placements.iter().enumerate() {
        for b in placements.iter().skip(i + 1) {
            assert!(
                !footprint(a).overlaps(&footprint(b)),
                "{} and {} overlap",
                a.file,
                b.file
            );
        }
    }

    let expected: i64 = placements.iter().map(|p| p.width * p.height).sum();
    let incremental = merger.occupancy().union();
    assert_eq!(incremental.area(), expected as f64);
    let full = Occupancy::from_canvas(merger.canvas(), merger.top(), FLOORPLAN);
    assert_eq!(full.union().area(), incremental.area());
}

#[test]
fn merging_is_deterministic() {
    let ws = Workspace::new();
    for i in 0..6 {
        let w = 100_000 + 50_000 * i;
        ws.add_submission(&format!("ELEC413_{i}.gds"), &design("top", w, 200_000));
        ws.add_submission(&format!("openEBL_{i}.gds"), &design("top", 200_000, w));
    }
    let first = merge(&ws, ws.config());
    let second = merge(&ws, ws.config());
    assert_eq!(first.placements(), second.placements());
    assert_eq!(first.placements().len(), 12);
}

#[test]
fn fine_resolution_is_rescaled() {
    let ws = Workspace::new();
    ws.add_submission(
        "EBeam_fine.gds",
        &design_with_dbu("fine", 1_000_000, 500_000, 0.0001),
    );
    let merger = merge(&ws, ws.config());
    let placement = &merger.placements()[0];
    assert_eq!((placement.width, placement.height), (100_000, 50_000));
    assert!(merger
        .report()
        .records_for("EBeam_fine.gds")
        .any(|r| r.message.contains("scaled by 0.1")));
}

#[test]
fn framework_blocks_the_packer() {
    let ws = Workspace::new();
    ws.add_framework(
        "EBL_Framework_1cm_PCM_static.gds",
        &design("framework", 8_780_000, 1_000_000),
    );
    ws.add_submission("EBeam_a.gds", &design("a", 100_000, 100_000));
    let merger = merge(&ws, ws.config());

    let placements = merger.placements();
    assert_eq!(placements[0].category, RESERVED_CATEGORY);
    assert_eq!((placements[0].x, placements[0].y), (0, 0));
    let placement = &placements[1];
    assert_eq!((placement.x, placement.y), (0, 1_002_000));
    let canvas = merger.canvas();
    let top = canvas.cell(merger.top()).unwrap();
    let fixed = canvas
        .cell_by_name(&format!("EBL_Framework_1cm_PCM_static.gds_{}", ws.files()[0].date_stamp()))
        .unwrap();
    assert!(top.insts().any(|i| i.cell() == fixed && i.loc() == Point::zero()));
}

#[test]
fn oversized_design_is_clipped() {
    let ws = Workspace::new();
    ws.add_submission("EBeam_big.gds", &design("big", 700_000, 500_000));
    let merger = merge(&ws, ws.config());
    let placement = &merger.placements()[0];
    assert_eq!((placement.width, placement.height), (605_000, 410_000));
    let records: Vec<_> = merger.report().records_for("EBeam_big.gds").collect();
    assert!(records.iter().any(|r| r.kind == RecordKind::Warning
        && r.message == "Cell was clipped to maximum size of 605000 X 410000"));
    assert!(records
        .iter()
        .any(|r| r.message == "clipped bounding box: (0,0;605000,410000)"));
}

#[test]
fn outputs_are_written() {
    let ws = Workspace::new();
    let mut src = design("alice", 200_000, 100_000);
    let key = src.cell_by_name("alice").unwrap();
    let cell = src.cell_mut(key).unwrap();
    cell.draw_rect(LayerSpec(63, 0), rect(0, 0, 10, 10));
    cell.draw_rect(LayerSpec(31, 0), rect(0, 0, 20, 20));
    ws.add_submission("openEBL_alice.gds", &src);
    ws.add_submission("EBeam_bob.oas", &design("bob", 10, 10));

    let merger = Merger::run(ws.config()).unwrap();
    assert_eq!(merger.num_errors(), 1);
    let outputs = merger.write_outputs(ws.out()).unwrap();

    let merged = Layout::from_gds(&outputs.gds).unwrap();
    assert_eq!(merged.top_cells().len(), 1);
    let top = merged.top_cells()[0];
    assert_eq!(merged.cell(top).unwrap().name(), "EBeam_2025_05");
    let layers = merged.layers_under(top);
    assert!(!layers.contains(&LayerSpec(63, 0)));
    assert!(!layers.contains(&LayerSpec(31, 0)));
    assert!(layers.contains(&WAVEGUIDE));

    let log = std::fs::read_to_string(&outputs.log).unwrap();
    assert!(log.contains("\nLoading: openEBL_alice.gds, dated "));
    assert!(log.contains("  - deleting layer: 63/0"));
    assert!(log.contains("  - course name: openEBL"));
    assert!(log.contains("  - ERROR: unsupported layout format"));

    let coords = std::fs::read_to_string(&outputs.coords).unwrap();
    assert_eq!(coords.lines().count(), 2);
    assert!(outputs.png.exists());
}
