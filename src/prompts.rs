// BigQuery MCP Gateway - Prompts
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Static report template served by the extended profile.

use crate::error::GatewayError;
use serde_json::{json, Value};

pub const GITLAB_REPORT: &str = "gitlab-report";
const DEFAULT_MILESTONE: &str = "3.11.0";

const GITLAB_REPORT_TEMPLATE: &str = r#"
# GitLabの開発状況の可視化

## 目的
BigQueryからGitLabのデータからマイルストーン"{milestone}"についてチームごとに振り返りのデータを作成します。
上記をそれぞれグラフにまとめ、日本人の向けたレポートを作成します。
グラフはプレゼンでプロが利用するようなモダンなデザインを目指します。
最後にこのデータからプロジェクトマネージメントの観点から所感と、仮説を提案してください。

## 抽出対象
 - コミット数の合計
   - merge_request_commitsの数を集計
 - マージリクエストの合計数
 - マージリクエストの合計数のstate別の合計数
 - マージされたマージリクエストのリードタイムの平均
 - 現在オープンされているMRを作成日が最も古い順から最大5個を抽出
   - weburi必須

## グラフ化
 - コミット数の合計
   - チーム別に棒グラフ
 - マージリクエストの合計数
   - チーム別に棒グラフ
 - マージリクエストの合計数のstate別の合計数
   - チーム別にstateで分類した積み上げ棒グラフ
 - マージされたマージリクエストのリードタイムの平均
   - チーム別に棒グラフ
 - 現在オープンされているMRを作成日が最も古い順から最大5個を抽出
   - table形式
     - weburiを記載
"#;

/// prompts/list payload
pub fn prompt_definitions() -> Vec<Value> {
    vec![json!({
        "name": GITLAB_REPORT,
        "description": "GitLabのマイルストーンに関するレポートを生成します。",
        "arguments": [{
            "name": "milestone",
            "description": "マイルストーン",
            "required": true
        }]
    })]
}

/// prompts/get payload. `milestone` replaces the default milestone when given.
pub fn get_prompt(name: &str, args: &Value) -> Result<Value, GatewayError> {
    if name != GITLAB_REPORT {
        return Err(GatewayError::UnknownPrompt(name.to_string()));
    }

    let milestone = args
        .get("milestone")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(DEFAULT_MILESTONE);

    Ok(json!({
        "messages": [{
            "role": "user",
            "content": {
                "type": "text",
                "text": GITLAB_REPORT_TEMPLATE.replace("{milestone}", milestone),
            }
        }]
    }))
}
