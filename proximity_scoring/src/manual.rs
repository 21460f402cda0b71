/*!

This is the long-form manual for `proximity_scoring` and `proxpoll`.

## Scoring

A participant selects a point strictly inside a triangle whose three vertices are the
categories of the poll. For each vertex, the raw score is

```text
raw = round(1 + 9 * (1 - distance / reference))   clamped to [1, 10]
```

where `reference` is the height of the triangle. The three raw scores are then scaled so
that they add up to the target total (12 by default). The rounding drift goes to the
largest score; if that would push it outside of `[minScore, maxScore]`, the excess is
carried to the next largest score.

A selection is accepted when every score is in range, the scores add up to the target
total, and at least one score reaches the decisiveness threshold (7 by default). The
centroid of the triangle always gives `4, 4, 4` and is always rejected.

## Configuration file

```json
{
  "title": "What matters most to you at work?",
  "vertices": [
    { "text": "Salary", "position": "top" },
    { "text": "People", "position": "left" },
    { "text": "Work", "position": "right" }
  ],
  "sideLength": 400,
  "rules": {
    "targetTotal": 12,
    "minScore": 1,
    "maxScore": 10,
    "decisivenessThreshold": 7,
    "hitRadius": 10
  }
}
```

`sideLength` and `rules` (and each field inside `rules`) are optional. The rules are
refused when three scores in `[minScore, maxScore]` cannot sum to `targetTotal`, or when
`decisivenessThreshold` is above the largest score such a triple can hold. The vertices are
given in the order top, left, right of the triangle. Without a configuration file, the
poll above is used.

## Commands

* `proxpoll score X Y` evaluates one point and prints the raw scores, the normalized
  scores and the verdict.
* `proxpoll submit --store FILE` records one submission in a JSON lines store, either from
  a point (`--x`, `--y`) or from a submit request in JSON (`--request FILE`). A participant
  who submits again replaces their previous answer.
* `proxpoll results --input FILE` tabulates the submissions per country and globally.
* `proxpoll generate --count N --seed S --out FILE` writes a deterministic sample store.

## Input formats

The following formats are supported by `results` (`--input-type`):
* `jsonl` (default) a store written by `submit` or `generate`
* `csv` Comma Separated Values with a header row
* `xlsx` an Excel export, first worksheet

### `jsonl`

One JSON object per line:

```json
{"id":1,"user_id":"9c2e...","country":"Japan","proximities":[{"label":"Salary","proximity":10},{"label":"People","proximity":1},{"label":"Work","proximity":1}]}
```

### `csv` and `xlsx`

The first row is a header. The columns `user_id` and `country` (case insensitive) are
optional; every label of the poll must have its own column holding the score.

| user_id | country | Salary | People | Work |
|---------|---------|--------|--------|------|
| u-1     | Japan   | 8      | 2      | 2    |
| u-2     |         | 2      | 2      | 8    |

Rows without a country are counted under `Unknown`. Rows without a user id get an id
made of the file name and the line number.

## Output

`results` writes:

```json
{
  "title": "What matters most to you at work?",
  "results": [
    { "country": "Japan", "participantCount": 1,
      "proximities": [ { "label": "Salary", "average": 8.0 }, ... ] }
  ],
  "global": { "participantCount": 2,
    "proximities": [ { "label": "Salary", "average": 6.0, "share": 50.0 }, ... ] }
}
```

The global averages are weighted by the number of participants of each country. The
`share` of a label is its global average divided by the sum of the global averages, in
percent.

With `--api`, only the `results` array is written, as returned by the fetch-results
endpoint. An empty store gives `[]` and a `null` global aggregate.

With `--reference FILE`, the output is compared to the reference file and the
differences are printed.
*/
