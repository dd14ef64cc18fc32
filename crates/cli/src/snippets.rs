//! Python programs run by `mcp-probe exec` when no code is given.

pub struct Snippet {
    pub title: &'static str,
    pub code: &'static str,
    pub modules: Option<&'static str>,
}

pub const SNIPPETS: [Snippet; 4] = [
    Snippet {
        title: "Simple Calculation",
        code: r#"
# Calculate factorial
def factorial(n):
    if n <= 1:
        return 1
    return n * factorial(n-1)

result = factorial(5)
print(f"Factorial of 5 is: {result}")

# Calculate fibonacci
def fibonacci(n):
    a, b = 0, 1
    fib_sequence = []
    for _ in range(n):
        fib_sequence.append(a)
        a, b = b, a + b
    return fib_sequence

print(f"First 10 Fibonacci numbers: {fibonacci(10)}")
"#,
        modules: None,
    },
    Snippet {
        title: "Data Processing",
        code: r#"
import json
import statistics

# Create sample data
data = {
    "numbers": [23, 45, 67, 89, 12, 34, 56, 78, 90, 21],
    "names": ["Alice", "Bob", "Charlie", "Diana", "Eve"]
}

# Process numbers
mean = statistics.mean(data["numbers"])
median = statistics.median(data["numbers"])
stdev = statistics.stdev(data["numbers"])

print(f"Statistics for numbers:")
print(f"  Mean: {mean:.2f}")
print(f"  Median: {median}")
print(f"  Std Dev: {stdev:.2f}")

# Process names
sorted_names = sorted(data["names"])
name_lengths = {name: len(name) for name in data["names"]}

print(f"\nName analysis:")
print(f"  Sorted: {sorted_names}")
print(f"  Lengths: {json.dumps(name_lengths, indent=2)}")
"#,
        modules: None,
    },
    Snippet {
        title: "Using External Modules (pandas)",
        code: r#"
import pandas as pd
import numpy as np

# Create a simple DataFrame
df = pd.DataFrame({
    'A': np.random.randn(5),
    'B': np.random.randn(5),
    'C': np.random.randn(5)
})

print("DataFrame:")
print(df)
print(f"\nDataFrame shape: {df.shape}")
print(f"\nColumn means:")
print(df.mean())
print(f"\nDataFrame info:")
df.info()
"#,
        modules: Some("pandas,numpy"),
    },
    Snippet {
        title: "Error Handling",
        code: r#"
# This will cause an error
try:
    result = 10 / 0
except ZeroDivisionError as e:
    print(f"Caught error: {e}")

# Undefined variable error (will not be caught)
print(undefined_variable)
"#,
        modules: None,
    },
];
