use achievement_rater::analyzers::achievement::compute;
use achievement_rater::analyzers::aggregate::aggregate;
use achievement_rater::analyzers::analyzer::analyze_workbook;
use achievement_rater::analyzers::grade::{Expectation, expectation};
use achievement_rater::analyzers::types::{AchievementRecord, Target};
use achievement_rater::config::{Apportion, ComponentWeights, WeightConfig, validate};
use achievement_rater::error::{ConfigError, StructureError};
use achievement_rater::grid::{Cell, RawGrid, Sheet, Workbook};
use achievement_rater::parser::{ColumnMap, Field, ObjectiveScore, Status, StudentRecord, infer};
use proptest::prelude::*;

fn header_sheet(labels: Vec<String>) -> Sheet {
    let header = labels.iter().map(|l| Cell::from(l.as_str())).collect();
    Sheet::new("s", RawGrid::new(vec![header]))
}

/// Integer percentages summing to 100, each at least `min`.
fn objective_percents(min: u32) -> impl Strategy<Value = [u32; 3]> {
    (min..=100 - 2 * min).prop_flat_map(move |a| {
        (min..=100 - a - min).prop_map(move |b| [a, b, 100 - a - b])
    })
}

fn config_from(percents: [u32; 3], usual: u32, threshold: f64) -> WeightConfig {
    WeightConfig {
        objective_weights: percents.map(|p| p as f64 / 100.0),
        component_weights: ComponentWeights {
            usual: usual as f64 / 100.0,
            final_exam: (100 - usual) as f64 / 100.0,
        },
        expectation_threshold: threshold,
        ..WeightConfig::default()
    }
}

/// Header spellings seen in registrar exports, per required field.
fn field_aliases() -> Vec<(Field, &'static str)> {
    vec![
        (Field::StudentId, "学号"),
        (Field::StudentId, "Student_ID"),
        (Field::StudentId, "student id"),
        (Field::StudentId, "ID"),
        (Field::StudentName, "姓名"),
        (Field::StudentName, "学生姓名"),
        (Field::StudentName, "Student Name"),
        (Field::StudentName, "name"),
        (Field::UsualScore, "平时"),
        (Field::UsualScore, "平时分"),
        (Field::UsualScore, "平时成绩"),
        (Field::UsualScore, "平时 成绩"),
        (Field::UsualScore, "Usual Score"),
        (Field::UsualScore, "usual_score"),
        (Field::FinalScore, "期末"),
        (Field::FinalScore, "期末考试"),
        (Field::FinalScore, "期末成绩"),
        (Field::FinalScore, "Final Exam"),
        (Field::TotalScore, "总评"),
        (Field::TotalScore, "总评成绩"),
        (Field::TotalScore, "总成绩"),
        (Field::TotalScore, "总分"),
        (Field::TotalScore, "成绩"),
        (Field::TotalScore, "Total"),
    ]
}

fn column_of(map: &ColumnMap, field: Field) -> Option<usize> {
    match field {
        Field::StudentId => Some(map.student_id),
        Field::StudentName => Some(map.student_name),
        Field::UsualScore => Some(map.usual_score),
        Field::FinalScore => Some(map.final_score),
        Field::TotalScore => Some(map.total_score),
        Field::ClassName => map.class_name,
        Field::ObjectiveScore { .. } => None,
    }
}

fn student(usual: f64, final_exam: f64, sub_scores: Option<[ObjectiveScore; 3]>) -> StudentRecord {
    StudentRecord {
        sheet: "s".to_string(),
        row: 1,
        id: "2021001".to_string(),
        name: "张三".to_string(),
        class_name: String::new(),
        usual_score: Some(usual),
        final_score: Some(final_exam),
        total_score: None,
        objective_scores: sub_scores,
        status: Status::Normal,
        status_note: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_synonyms_resolve_to_same_column(
        (field, label) in prop::sample::select(field_aliases()),
        padding in 0usize..4,
    ) {
        let mut header = ["学号", "姓名", "平时", "期末", "总评"];
        let slot = Field::REQUIRED
            .iter()
            .position(|f| *f == field)
            .expect("required field");
        header[slot] = label;

        let mut labels: Vec<String> = (0..padding).map(|i| format!("备注{i}")).collect();
        labels.extend(header.map(String::from));
        let layout = infer(&header_sheet(labels)).expect("header resolves");
        for (i, required) in Field::REQUIRED.into_iter().enumerate() {
            prop_assert_eq!(column_of(&layout.groups[0], required), Some(padding + i));
        }
    }

    #[test]
    fn prop_unknown_label_is_missing_column(
        label in prop::sample::select(vec!["分数", "课堂表现", "作业", "考勤"]),
    ) {
        let labels = ["学号", "姓名", label, "期末考试", "总评成绩"].map(String::from).to_vec();
        let result = infer(&header_sheet(labels));
        prop_assert!(
            matches!(
                result,
                Err(StructureError::MissingColumn { field: Field::UsualScore, row: 0, .. })
            ),
            "unexpected {:?}",
            result
        );
    }

    #[test]
    fn prop_valid_configs_round_trip(
        percents in objective_percents(0),
        usual in 0u32..=100,
        threshold in 0.0f64..=1.0,
    ) {
        let config = config_from(percents, usual, threshold);
        prop_assert_eq!(validate(config.clone()), Ok(config));
    }

    #[test]
    fn prop_deviating_sum_fails_first_check(
        percents in objective_percents(0),
        scale in prop_oneof![0.1f64..0.99, 1.01f64..2.0],
    ) {
        let mut config = WeightConfig::default();
        config.objective_weights = percents.map(|p| p as f64 / 100.0 * scale);

        let first = validate(config.clone());
        prop_assert_eq!(&first, &validate(config.clone()));
        match config.objective_weights.iter().position(|w| *w > 1.0) {
            Some(index) => prop_assert!(
                matches!(first, Err(ConfigError::ObjectiveWeightOutOfRange { index: i, .. }) if i == index),
                "expected ObjectiveWeightOutOfRange at index {}, got {:?}", index, first
            ),
            None => prop_assert!(
                matches!(first, Err(ConfigError::ObjectiveWeightSum { .. })),
                "expected ObjectiveWeightSum, got {:?}", first
            ),
        }
    }

    #[test]
    fn prop_degrees_are_bounded(
        percents in objective_percents(1),
        usual_weight in 0u32..=100,
        usual in -50.0f64..200.0,
        final_exam in -50.0f64..200.0,
        sub in prop::option::of(prop::array::uniform3((0.0f64..80.0, 0.0f64..80.0))),
        rounded in any::<bool>(),
    ) {
        let mut config = config_from(percents, usual_weight, 0.6);
        if rounded {
            config.apportion = Apportion::RoundedPoints;
        }
        let sub_scores = sub.map(|s| s.map(|(u, f)| ObjectiveScore { usual: u, final_exam: f }));
        let result = compute(&student(usual, final_exam, sub_scores), &config)
            .expect("no invariant violation")
            .expect("scorable");
        for degree in result.per_objective {
            prop_assert!((0.0..=1.0).contains(&degree));
        }
        prop_assert!((0.0..=1.0).contains(&result.aggregate));
    }

    #[test]
    fn prop_threshold_tie_meets_and_ulp_below_does_not(threshold in 0.0f64..=1.0) {
        prop_assert_eq!(expectation(threshold, threshold), Expectation::Meets);
        if threshold > 0.0 {
            let below = f64::from_bits(threshold.to_bits() - 1);
            prop_assert_eq!(expectation(below, threshold), Expectation::Below);
        }

        let config = WeightConfig { expectation_threshold: threshold, ..WeightConfig::default() };
        let record = AchievementRecord {
            student_id: "2021001".to_string(),
            blended_score: threshold * 100.0,
            per_objective: [threshold; 3],
            aggregate: threshold,
        };
        let distribution = aggregate(&[record], &config);
        let overall = distribution.set(Target::Overall).expect("overall set");
        prop_assert_eq!(overall.expectation[0].count, 1);
    }

    #[test]
    fn prop_absent_students_never_enter_denominators(
        scores in prop::collection::vec((0u32..=100, 0u32..=100), 1..8),
        absent in 1usize..5,
    ) {
        let mut rows = vec![
            ["学号", "姓名", "平时", "期末", "总评"].into_iter().map(Cell::from).collect::<Vec<_>>(),
        ];
        for (i, (u, f)) in scores.iter().enumerate() {
            rows.push(vec![
                Cell::from(format!("20210{i:02}").as_str()),
                Cell::from("甲"),
                Cell::from(*u as f64),
                Cell::from(*f as f64),
                Cell::Empty,
            ]);
        }
        for i in 0..absent {
            rows.push(vec![
                Cell::from(format!("20220{i:02}").as_str()),
                Cell::from("乙"),
                Cell::from("缺考"),
                Cell::Empty,
                Cell::Empty,
            ]);
        }
        let workbook = Workbook { name: "w".to_string(), sheets: vec![Sheet::new("s", RawGrid::new(rows))] };
        let report = analyze_workbook(&workbook, &WeightConfig::default()).expect("analysis").report;

        prop_assert_eq!(report.calculation.student_table.len(), scores.len() + absent);
        for set in &report.statistics.distribution_table {
            prop_assert_eq!(set.classified, scores.len());
            let total: usize = set.bands.iter().map(|b| b.count).sum();
            prop_assert_eq!(total, scores.len());
        }
    }
}
