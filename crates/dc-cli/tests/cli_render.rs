use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dcard"))
}

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("dcard_cli_{}_{}_{}", std::process::id(), nanos, name));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

const CONFIG: &str = r#"
year: "2018"
category: SR
processes:
  - { name: ttH, samples: [ttHTobb], signal: true }
  - { name: tt, samples: [TTToSemiLeptonic] }
systematics:
  - { name: lumi, type: lnN, processes: [ttH, tt], value: 1.02 }
"#;

const HISTOGRAMS: &str = r#"{
  "ttHTobb": {
    "ttHTobb_2018": {
      "edges": [0.0, 1.0, 2.0],
      "cells": [{"category": "SR", "variation": "nominal", "values": [10.0, 20.0]}]
    }
  },
  "TTToSemiLeptonic": {
    "TTToSemiLeptonic_2018": {
      "edges": [0.0, 1.0, 2.0],
      "cells": [{"category": "SR", "variation": "nominal", "values": [30.0, 40.0]}]
    }
  }
}"#;

const METADATA: &str = r#"{
  "by_datataking_period": {
    "2018": {"ttHTobb": ["ttHTobb_2018"], "TTToSemiLeptonic": ["TTToSemiLeptonic_2018"]}
  }
}"#;

fn write_inputs(dir: &Path, config: &str) -> [String; 3] {
    std::fs::create_dir_all(dir).unwrap();
    let files =
        [("job.yaml", config), ("histograms.json", HISTOGRAMS), ("metadata.json", METADATA)];
    files.map(|(name, body)| {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    })
}

#[test]
fn render_writes_card_and_shapes() {
    let dir = tmp_dir("render");
    let [config, histograms, metadata] = write_inputs(&dir, CONFIG);
    let out_dir = dir.join("out");

    let out = run(&[
        "render",
        "--config",
        &config,
        "--histograms",
        &histograms,
        "--metadata",
        &metadata,
        "--out-dir",
        out_dir.to_string_lossy().as_ref(),
    ]);
    assert!(
        out.status.success(),
        "render should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["bin"], "SR_2018");
    assert_eq!(summary["jmax"], 1);
    assert_eq!(summary["rates"]["ttH"].as_f64(), Some(30.0));
    assert_eq!(summary["rates"]["tt"].as_f64(), Some(70.0));

    let card = std::fs::read_to_string(out_dir.join("datacard.txt")).unwrap();
    let lumi = card.lines().find(|l| l.starts_with("lumi")).unwrap();
    assert_eq!(lumi.split_whitespace().collect::<Vec<_>>(), ["lumi", "lnN", "1.02", "1.02"]);

    let shapes: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("shapes.json")).unwrap())
            .unwrap();
    let tt = &shapes["tt_nominal"];
    assert_eq!(tt["storage"]["type"], "weighted");
    assert_eq!(tt["storage"]["values"], serde_json::json!([0.0, 30.0, 40.0, 0.0]));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn validate_reports_missing_variations() {
    let dir = tmp_dir("validate");
    let config = format!(
        "{}  - {{ name: JES, type: shape, processes: {{ tt: 1.0 }} }}\n",
        CONFIG.trim_start()
    );
    let [config, histograms, metadata] = write_inputs(&dir, &config);

    let out = run(&[
        "validate",
        "--config",
        &config,
        "--histograms",
        &histograms,
        "--metadata",
        &metadata,
    ]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("JESUp"), "stderr={stderr}");
    assert!(stderr.contains("TTToSemiLeptonic/TTToSemiLeptonic_2018"), "stderr={stderr}");

    // out of scope for 2017: no dataset lists
    let out = run(&[
        "validate",
        "--config",
        &config,
        "--histograms",
        &histograms,
        "--metadata",
        &metadata,
        "--year",
        "2017",
    ]);
    assert!(!out.status.success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn validate_accepts_complete_inputs() {
    let dir = tmp_dir("validate_ok");
    let [config, histograms, metadata] = write_inputs(&dir, CONFIG);

    let out =
        run(&["validate", "-c", &config, "--histograms", &histograms, "--metadata", &metadata]);
    assert!(
        out.status.success(),
        "validate should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("ok: 2 processes, 1 variations"));

    let _ = std::fs::remove_dir_all(&dir);
}
