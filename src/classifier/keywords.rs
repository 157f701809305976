use super::Topic;

// Checked in order; the first topic with a matching trigger wins.
pub(super) const TOPIC_TRIGGERS: &[(Topic, &[&str])] = &[
    (Topic::Anxiety, &["anxious", "anxiety", "nervous", "panic"]),
    (Topic::Depression, &["depress", "sad", "hopeless", "empty"]),
    (Topic::Stress, &["stress", "overwhelm", "pressure", "burnout"]),
];

pub(super) const CRISIS_TRIGGERS: &[&str] = &["suicide", "kill myself", "end it all", "want to die"];
