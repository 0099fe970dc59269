//! End-to-end pipeline tests driving [`Detector::check`] directly, covering
//! the worked scenarios a complete detector configuration must satisfy.

use std::io::Write;

use sprout_guard::config::DetectorConfig;
use sprout_guard::detector::Detector;
use sprout_guard::model::{CheckRequest, CheckResponse, Meta};

fn request(user_id: &str, msg: &str) -> CheckRequest {
    CheckRequest {
        msg: msg.to_owned(),
        user_id: user_id.to_owned(),
        user_name: "tester".to_owned(),
        meta: Meta::default(),
    }
}

fn find<'a>(responses: &'a [CheckResponse], name: &str) -> &'a CheckResponse {
    responses.iter().find(|r| r.name == name).unwrap_or_else(|| panic!("no `{}` response", name))
}

/// Writes `lines` to a uniquely-named file under the OS temp dir and returns
/// its path; used to exercise the stop-words/sample-file loading paths
/// without reaching into `Detector`'s private state.
fn write_lines(file_name: &str, lines: &[&str]) -> String {
    let path = std::env::temp_dir().join(file_name);
    let mut file = std::fs::File::create(&path).expect("couldn't create test fixture file");
    for line in lines {
        writeln!(file, "{}", line).expect("couldn't write test fixture file");
    }
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn short_clean_message_is_ham() {
    let detector = Detector::new(DetectorConfig {
        min_msg_len: 150,
        max_allowed_emoji: 1,
        ..DetectorConfig::default()
    })
    .unwrap();

    let (spam, responses) = detector.check(&request("1", "good message")).await;
    assert!(!spam);

    let stop_word = find(&responses, "stopword");
    assert_eq!(stop_word.spam, false);
    assert_eq!(stop_word.details, "not found");

    let emoji = find(&responses, "emoji");
    assert_eq!(emoji.spam, false);
    assert_eq!(emoji.details, "0/1");

    let length = find(&responses, "message length");
    assert_eq!(length.spam, false);
    assert_eq!(length.details, "too short");
}

#[tokio::test]
async fn stop_word_hit_inside_long_message_is_spam() {
    let stop_words_file = write_lines("sprout_guard_test_stopwords.txt", &["в личку", "всем привет"]);

    let detector = Detector::new(DetectorConfig {
        min_msg_len: 150,
        max_allowed_emoji: 1,
        stop_words_file: Some(stop_words_file),
        ..DetectorConfig::default()
    })
    .unwrap();

    let long_message = format!("Hello there, please send me a message в личкУ {}", "padding ".repeat(20));
    let (spam, responses) = detector.check(&request("1", &long_message)).await;
    assert!(spam);

    let stop_word = find(&responses, "stopword");
    assert_eq!(stop_word.spam, true);
    assert_eq!(stop_word.details, "в личку");
}

#[tokio::test]
async fn third_duplicate_triggers_with_prior_message_ids_to_delete() {
    let detector = Detector::new(DetectorConfig {
        threshold: 3,
        window_secs: 3600,
        ..DetectorConfig::default()
    })
    .unwrap();

    let mut first = request("123", "spam");
    first.meta.message_id = 100;
    let mut second = request("123", "spam");
    second.meta.message_id = 101;
    let mut third = request("123", "spam");
    third.meta.message_id = 102;

    detector.check(&first).await;
    detector.check(&second).await;
    let (spam, responses) = detector.check(&third).await;

    assert!(spam);
    let duplicate = find(&responses, "duplicate");
    assert_eq!(duplicate.details, "message repeated 3 times in 0s");
    assert_eq!(duplicate.extra_delete_ids, vec![100, 101]);
}

#[tokio::test]
async fn classifier_distinguishes_spam_from_ham_after_training() {
    let spam_file = write_lines("sprout_guard_test_spam_samples.txt", &["win free iPhone", "lottery prize xyz"]);
    let ham_file = write_lines(
        "sprout_guard_test_ham_samples.txt",
        &["hello world", "how are you", "have a good day"],
    );
    let excluded_file = write_lines("sprout_guard_test_excluded_tokens.txt", &["xyz"]);

    let detector = Detector::new(DetectorConfig {
        min_msg_len: 0,
        spam_samples_file: Some(spam_file),
        ham_samples_file: Some(ham_file),
        excluded_tokens_file: Some(excluded_file),
        ..DetectorConfig::default()
    })
    .unwrap();

    let (ham_spam, ham_responses) = detector.check(&request("1", "Hello, how are you?")).await;
    assert!(!ham_spam);
    assert_eq!(find(&ham_responses, "classifier").spam, false);

    let (spam_spam, spam_responses) = detector.check(&request("2", "Win a free iPhone now!")).await;
    assert!(spam_spam);
    assert_eq!(find(&spam_responses, "classifier").spam, true);
}

#[tokio::test]
async fn load_samples_updates_the_live_classifier() {
    let detector = Detector::new(DetectorConfig { min_msg_len: 0, ..DetectorConfig::default() }).unwrap();

    assert!(detector.check(&request("1", "win a free iphone now")).await.0 == false, "no samples learned yet");

    detector
        .load_samples(&["win free iphone".to_owned()], &["hello there friend".to_owned()])
        .await
        .expect("load_samples should not fail");

    let (spam, responses) = detector.check(&request("1", "win a free iphone now")).await;
    assert!(spam);
    assert_eq!(find(&responses, "classifier").spam, true);
}

#[tokio::test]
async fn llm_veto_clears_a_prior_stop_word_spam_verdict() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": {
                    "content": "{\"spam\":false,\"reason\":\"good text\",\"confidence\":100}"
                }
            }]
        })))
        .mount(&server)
        .await;

    let stop_words_file = write_lines("sprout_guard_test_veto_stopwords.txt", &["в личку"]);
    let long_message = format!("please send me a message в личку {}", "padding ".repeat(20));

    let detector = Detector::new(DetectorConfig {
        min_msg_len: 10,
        stop_words_file: Some(stop_words_file),
        llm: sprout_guard::config::LlmSection {
            api_base: server.uri(),
            open_ai_veto: true,
            ..sprout_guard::config::LlmSection::default()
        },
        ..DetectorConfig::default()
    })
    .unwrap();

    let (spam, responses) = detector.check(&request("1", &long_message)).await;

    assert!(!spam);
    assert_eq!(find(&responses, "stopword").spam, true);
    assert_eq!(find(&responses, "openai").spam, false);
}
