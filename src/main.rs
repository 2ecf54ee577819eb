use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use exam_hotspot::utils::logging;
use exam_hotspot::{Config, DocumentInput, StudySession, UploadOutcome};

#[derive(Parser, Debug)]
#[command(name = "exam-hotspot", version, about = "医学考试题目提取、分类与练习")]
struct Cli {
    /// 本地数据目录（覆盖 DATA_DIR）
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// 显示详细日志（覆盖 VERBOSE_LOGGING）
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 上传一份试卷（PDF / 图片 / 文本），提取并分类其中的题目
    Upload { file: PathBuf },
    /// 作答一道题并查看解析
    Answer {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        question: String,
        #[arg(long)]
        option: String,
    },
    /// 删除某个文件带来的全部题目
    Delete { file_name: String },
    /// 清空全部本地数据
    Clear,
    /// 显示科目 / 主题热点和作答统计
    Report,
    /// 列出已上传的文件
    Files,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    config.verbose_logging |= cli.verbose;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 只有上传和作答需要模型凭证
    let mut session = match cli.command {
        Commands::Upload { .. } | Commands::Answer { .. } => {
            StudySession::initialize(&config).await?
        }
        _ => StudySession::open_local(&config).await?,
    };

    match cli.command {
        Commands::Upload { file } => {
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("无法解析文件名")?
                .to_string();
            let input = DocumentInput::from_path(&file).await?;

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("⏹️ 收到 Ctrl-C，当前批次完成后丢弃结果");
                    on_ctrl_c.cancel();
                }
            });

            match session.upload_document(&file_name, &input, &cancel).await? {
                UploadOutcome::Classified { questions, report } => {
                    println!(
                        "✓ {}: 提取 {} 道，分类成功 {} 道，失败 {} 道，跳过 {} 道",
                        file_name,
                        questions,
                        report.classified.len(),
                        report.failed,
                        report.skipped
                    );
                    for q in &report.classified {
                        println!("  - {}", q);
                    }
                }
                UploadOutcome::NoQuestionsFound => {
                    println!("⚠️ {} 中没有找到题目", file_name);
                }
                UploadOutcome::Cancelled => {
                    println!("⏹️ 已取消，没有保存任何数据");
                }
            }
        }
        Commands::Answer {
            subject,
            topic,
            question,
            option,
        } => {
            let outcome = session
                .answer_question(&subject, &topic, &question, &option)
                .await?;
            let e = &outcome.explanation;
            println!(
                "{} 正确答案: {}",
                if outcome.is_correct { "✅ 回答正确" } else { "❌ 回答错误" },
                e.correct_answer
            );
            println!("\n{}\n", e.explanation);
            for d in &e.distractor_explanations {
                println!("  {}: {}", d.option, d.explanation);
            }
            println!("\n参考文献:");
            for c in &e.citations {
                println!("  - {}", c);
            }
        }
        Commands::Delete { file_name } => {
            session.delete_source_file(&file_name)?;
            println!("✓ 已删除 {} 的全部题目", file_name);
        }
        Commands::Clear => {
            session.clear_all_data()?;
            println!("✓ 本地数据已清空");
        }
        Commands::Report => print_report(&session),
        Commands::Files => {
            let files = session.uploaded_files();
            if files.is_empty() {
                println!("还没有上传任何文件");
            }
            for f in files {
                println!("{}", f);
            }
        }
    }

    info!("✓ 完成");
    Ok(())
}

fn print_report(session: &StudySession) {
    println!("{}", "=".repeat(60));
    println!("📊 题目热点");
    println!("{}", "=".repeat(60));
    for subject in session.subjects() {
        let mut topics: Vec<_> = subject.topics.iter().filter(|t| t.count() > 0).collect();
        if topics.is_empty() {
            continue;
        }
        topics.sort_by(|a, b| b.count().cmp(&a.count()));
        println!("[{}] {} ({} 道)", subject.icon(), subject.name, subject.question_count());
        for t in topics {
            println!("    {:<40} {:>3}  {}", t.name, t.count(), t.files().join(", "));
        }
    }

    let rows = session.performance_summary();
    if rows.is_empty() {
        return;
    }
    println!("{}", "=".repeat(60));
    println!("📈 作答统计");
    println!("{}", "=".repeat(60));
    for row in rows {
        match &row.topic {
            None => println!("{:<44} {:>3}/{:<3} {:>3}%", row.subject, row.correct, row.total, row.accuracy),
            Some(topic) => println!("    {:<40} {:>3}/{:<3} {:>3}%", topic, row.correct, row.total, row.accuracy),
        }
    }
}
