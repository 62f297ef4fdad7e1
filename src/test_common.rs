#![cfg(test)]

use crate::error::Error;
use crate::flag::Flag;
use crate::segment::Segment;
use crate::store::Store;

pub struct TestStore {
    flags: Vec<Flag>,
    segments: Vec<Segment>,
}

impl TestStore {
    pub const FLAG_KEYS: [&'static str; 6] = [
        "age-gate",
        "john-only",
        "beta-user",
        "no-default",
        "short-split",
        "huge-split",
    ];

    pub fn new() -> Self {
        let flags = vec![
            serde_json::from_str(
                r#"{
                    "id": "f1",
                    "key": "age-gate",
                    "name": "Age gate",
                    "enabled": true,
                    "version": 3,
                    "variants": [
                        {"id": "v1", "value": "default", "defaultWhenOn": true},
                        {"id": "v2", "value": "off", "defaultWhenOff": true},
                        {"id": "v3", "value": "adult"}
                    ],
                    "rules": [
                        {
                            "id": "r1",
                            "constraints": [
                                {"id": "c1", "property": "age", "operation": "GREATER_OR_EQUAL", "values": [18]}
                            ],
                            "distributions": [
                                {"id": "d1", "variant": {"id": "v3", "value": "adult"}, "percentage": 100}
                            ]
                        }
                    ]
                }"#,
            ),
            serde_json::from_str(
                r#"{
                    "id": "f2",
                    "key": "john-only",
                    "enabled": true,
                    "version": 1,
                    "variants": [
                        {"id": "no", "value": false, "defaultWhenOn": true, "defaultWhenOff": true},
                        {"id": "yes", "value": true}
                    ],
                    "rules": [
                        {
                            "id": "r1",
                            "constraints": [
                                {"property": "", "operation": "IS_IN_SEGMENT", "values": ["seg-john"]}
                            ],
                            "distributions": [
                                {"variant": {"id": "yes", "value": true}, "percentage": 100}
                            ]
                        }
                    ]
                }"#,
            ),
            serde_json::from_str(
                r#"{
                    "id": "f3",
                    "key": "beta-user",
                    "enabled": true,
                    "version": 7,
                    "variants": [
                        {"id": "one", "value": 1, "defaultWhenOn": true, "defaultWhenOff": true},
                        {"id": "two", "value": 2}
                    ],
                    "rules": [
                        {
                            "id": "r1",
                            "constraints": [
                                {"property": "$userId", "operation": "ONE_OF", "values": ["user-1", "user-2"]},
                                {"property": "$ip", "operation": "STARTS_WITH", "values": ["192.168."]}
                            ],
                            "distributions": [
                                {"variant": {"id": "two", "value": 2}, "percentage": 100}
                            ]
                        }
                    ]
                }"#,
            ),
            serde_json::from_str(
                r#"{
                    "id": "f4",
                    "key": "no-default",
                    "enabled": true,
                    "version": 1,
                    "variants": [{"id": "v1", "value": true}]
                }"#,
            ),
            serde_json::from_str(
                r#"{
                    "id": "f5",
                    "key": "short-split",
                    "enabled": true,
                    "version": 2,
                    "variants": [
                        {"id": "x", "value": "x", "defaultWhenOn": true, "defaultWhenOff": true},
                        {"id": "a", "value": "a"}
                    ],
                    "rules": [
                        {
                            "id": "r1",
                            "distributions": [{"variant": {"id": "a", "value": "a"}, "percentage": 50}]
                        }
                    ]
                }"#,
            ),
            serde_json::from_str(
                r#"{
                    "id": "f6",
                    "key": "huge-split",
                    "enabled": true,
                    "version": 1,
                    "variants": [
                        {"id": "x", "value": "x", "defaultWhenOn": true, "defaultWhenOff": true},
                        {"id": "small", "value": "small"},
                        {"id": "huge", "value": "huge"}
                    ],
                    "rules": [
                        {
                            "id": "r1",
                            "distributions": [
                                {"variant": {"id": "small", "value": "small"}, "percentage": 50},
                                {"variant": {"id": "huge", "value": "huge"}, "percentage": 4294967295}
                            ]
                        }
                    ]
                }"#,
            ),
        ]
        .into_iter()
        .collect::<Result<Vec<Flag>, _>>()
        .unwrap();

        let segments = vec![serde_json::from_str(
            r#"{
                "id": "seg-john",
                "key": "johns",
                "name": "Johns",
                "rules": [
                    {"id": "sr1", "constraints": [{"property": "name", "operation": "ONE_OF", "values": ["John"]}]}
                ]
            }"#,
        )
        .unwrap()];

        TestStore { flags, segments }
    }

    pub fn empty() -> Self {
        TestStore {
            flags: Vec::new(),
            segments: Vec::new(),
        }
    }

    pub fn flag(&self, key: &str) -> Flag {
        self.find_flag_by_key(key).unwrap()
    }
}

impl Store for TestStore {
    fn find_flag_by_key(&self, flag_key: &str) -> Result<Flag, Error> {
        self.flags
            .iter()
            .find(|f| f.key == flag_key)
            .cloned()
            .ok_or_else(|| Error::FlagNotFound {
                key: flag_key.to_string(),
            })
    }

    fn find_all_flags(&self) -> Result<Vec<Flag>, Error> {
        Ok(self.flags.clone())
    }

    fn find_all_segments(&self) -> Result<Vec<Segment>, Error> {
        Ok(self.segments.clone())
    }
}
